//! Registers the employees domain's handlers against an
//! [`EndpointCatalogBuilder`] (spec §4.D), one `register_*` call per
//! delivery mode the domain exercises.

use crate::models::{CreateEmployeeRequest, DepartmentSyncEvent, EmployeeResponse, GetEmployeeRequest, OnboardEmployeeRequest};
use crate::service::EmployeeService;
use messaging::DomainError;
use messaging_host::{EndpointCatalogBuilder, EndpointOptions};
use std::sync::Arc;
use uuid::Uuid;

const HANDLER: &str = "EmployeeEventController";

/// Registers every employees endpoint onto `builder`.
pub fn register(builder: EndpointCatalogBuilder, service: Arc<EmployeeService>) -> EndpointCatalogBuilder {
    let builder = {
        let service = service.clone();
        builder.register_request_reply(
            EndpointOptions::new(HANDLER, "GetEmployee", "[controller].v{version:apiVersion}.{id}.get"),
            move |_req: GetEmployeeRequest, ctx| {
                let service = service.clone();
                async move {
                    let id = ctx
                        .binding
                        .get("id")
                        .ok_or_else(|| DomainError::validation("subject carried no employee id"))?;
                    let id = Uuid::parse_str(id).map_err(|e| DomainError::validation(format!("invalid employee id: {e}")))?;
                    service.get(id).await.map_err(DomainError::from)
                }
            },
        )
    };

    let builder = {
        let service = service.clone();
        builder.register_core_pub_sub(
            EndpointOptions::new(HANDLER, "CreateEmployee", "[controller].create"),
            move |req: CreateEmployeeRequest, ctx| {
                let service = service.clone();
                async move {
                    use validator::Validate;
                    req.validate().map_err(|e| DomainError::validation(e.to_string()))?;
                    service
                        .create(req, &ctx.outbound_trace())
                        .await
                        .map(|_: EmployeeResponse| ())
                        .map_err(DomainError::from)
                }
            },
        )
    };

    let builder = {
        let service = service.clone();
        builder.register_js_consume(
            EndpointOptions::new(HANDLER, "SyncDepartment", "[controller].sync"),
            move |req: DepartmentSyncEvent, _ctx| {
                let service = service.clone();
                async move { service.sync_department(req.employee_id, &req.department).await.map_err(DomainError::from) }
            },
        )
    };

    builder.register_js_fetch(
        EndpointOptions::new(HANDLER, "ProcessOnboarding", "[controller].onboarding.queue"),
        move |req: OnboardEmployeeRequest, _ctx| {
            let service = service.clone();
            async move { service.onboard(req.employee_id).await.map_err(DomainError::from) }
        },
    )
}
