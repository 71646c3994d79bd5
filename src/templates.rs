pub const PLANNER_SYSTEM_MD: &str = include_str!("../prompts/planner_system.md");
pub const REVIEWER_SYSTEM_MD: &str = include_str!("../prompts/reviewer_system.md");
pub const FINALIZER_SYSTEM_MD: &str = include_str!("../prompts/finalizer_system.md");
pub const POST_USER_MD: &str = include_str!("../prompts/post_user.md");
pub const REVIEWER_USER_MD: &str = include_str!("../prompts/reviewer_user.md");
pub const FINALIZER_USER_MD: &str = include_str!("../prompts/finalizer_user.md");
