// ==============
// crates/core-lib/src/metrics.rs

//! Central place for metric keys
pub const USER_REGISTERED: &str = "user.registered";
pub const USER_DELETED: &str = "user.deleted";
pub const LOGIN_SUCCEEDED: &str = "auth.login.succeeded";
pub const LOGIN_FAILED: &str = "auth.login.failed";
pub const REMEMBER_ISSUED: &str = "auth.remember.issued";
pub const REMEMBER_FORGOTTEN: &str = "auth.remember.forgotten";
pub const FOLLOW_CREATED: &str = "graph.follow.created";
pub const MICROPOST_CREATED: &str = "micropost.created";
pub const FEED_COMPUTED: &str = "feed.computed";
pub const ACTIVATION_ISSUED: &str = "auth.activation.issued";
pub const USER_ACTIVATED: &str = "auth.activation.completed";
pub const RESET_ISSUED: &str = "auth.reset.issued";
pub const PASSWORD_RESET: &str = "auth.reset.completed";
