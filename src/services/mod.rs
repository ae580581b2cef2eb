//! Business logic services.
//!
//! Services own a pool handle and a logger; they hold no cached state, so
//! every call reads the store afresh. The rebalance queue and worker carry
//! user activity changes off the request path.

pub mod assignment;
pub mod rebalance_queue;
pub mod rebalance_worker;
pub mod statistics;
pub mod teams;
pub mod users;

pub use assignment::AssignmentService;
pub use rebalance_queue::{RebalanceEvent, RebalancePublisher};
pub use rebalance_worker::{RebalanceReport, RebalanceWorker, WorkerStats};
pub use statistics::StatisticsService;
pub use teams::TeamService;
pub use users::{UserReviews, UserService};
