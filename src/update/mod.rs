pub mod compat;
pub mod expand;
pub mod info;
pub mod metadata;
pub mod plan;

pub use compat::{CompatOverrides, CompatViolation, validate_updates};
pub use expand::{build_package_list, expand_candidates};
pub use info::{PackageInfo, build_package_info};
pub use plan::{MigrationTask, UpdatePlan, build_outdated_report, build_plan, migrate_only_task};
