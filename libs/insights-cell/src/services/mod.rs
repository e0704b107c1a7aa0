pub mod dashboard;
pub mod gamification;
pub mod timeline;

pub use dashboard::DashboardService;
pub use gamification::GamificationService;
pub use timeline::TimelineService;
