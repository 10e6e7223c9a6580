//! 工具箱：注册表、执行器、检索工具、智能体工具

pub mod agent_tool;
pub mod executor;
pub mod registry;
pub mod schema;
pub mod web_search;

pub use agent_tool::{AgentTool, AgentToolInput};
pub use executor::ToolExecutor;
pub use registry::{Tool, ToolRegistry};
pub use schema::parameters_schema;
pub use web_search::{FirecrawlClient, RetrievalClient, SearchHit, WebSearchTool};
