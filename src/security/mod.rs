//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Matched endpoint:
//!     → auth.rs (resolve the user once, memoized in the request scope)
//!     → rate_limit.rs (count the request against user or remote address)
//!     → 429 on violation, otherwise on to binding
//! ```
//!
//! # Design Decisions
//! - Authentication is an application collaborator; the server only asks
//! - Rate limiting is a regular service, enabled from configuration
//! - Time is injected so throttling is testable without sleeping

pub mod auth;
pub mod clock;
pub mod rate_limit;

pub use auth::{AuthenticationProvider, NoAuthentication, User};
pub use clock::{MockTimeProvider, RealTimeProvider, TimeProvider};
pub use rate_limit::{
    RateLimitKey, RateLimitService, RateLimitSettings, RateLimitUserInfo, RateLimiter,
    SlidingWindowRateLimiter,
};
