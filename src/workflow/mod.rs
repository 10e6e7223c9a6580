//! 工作流：路由器（意图 + 分派）与会话协调器（加载、持久化、会话管理）

pub mod coordinator;
pub mod router;

pub use coordinator::{new_conversation_id, TurnOutcome, Workflow};
pub use router::{Router, RouterPhase};
