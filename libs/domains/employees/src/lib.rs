//! Employees domain.
//!
//! A sample domain exercising every delivery mode the messaging core
//! supports end to end:
//!
//! ```text
//! Endpoints (endpoints::register)
//!   GetEmployee        — request-reply
//!   CreateEmployee     — core pub-sub
//!   SyncDepartment     — JetStream continuous consume
//!   ProcessOnboarding  — JetStream batch fetch
//!       │
//!       ▼
//! EmployeeService (service.rs)
//!   ├─ consistency-hook: in-process "employee.created" fan-out
//!   ├─ outbox: "employee.provisioned" cross-service event
//!   └─ saga: employee_onboarding (onboarding.rs)
//!       │
//!       ▼
//! repository.rs (SeaORM, DeriveEntityModel)
//! ```

pub mod endpoints;
pub mod entity;
pub mod error;
pub mod models;
pub mod onboarding;
pub mod repository;
pub mod service;

pub use error::EmployeeError;
pub use onboarding::OnboardingData;
pub use service::EmployeeService;
