use utoipa::openapi::path::{OperationBuilder, ParameterBuilder, ParameterIn, PathItem, PathItemType};
use utoipa::openapi::request_body::RequestBodyBuilder;
use utoipa::openapi::{ContentBuilder, Ref, Required, ResponseBuilder, ResponsesBuilder};
use utoipa::{OpenApi, ToSchema};

#[derive(ToSchema)]
pub struct HealthResponse { pub status: String }

#[derive(ToSchema)]
pub struct LoginRequest { pub email: String, pub password: String }

/// Body shape of every `/api` response.
#[derive(ToSchema)]
#[schema(rename_all = "camelCase")]
pub struct EnvelopeDoc {
    pub succeeded: bool,
    #[schema(value_type = Object)]
    pub payload: Option<serde_json::Value>,
    pub message: Option<String>,
    pub errors: Vec<String>,
}

#[derive(ToSchema)]
#[schema(rename_all = "camelCase")]
pub struct CarForm {
    pub brand: String,
    pub model: String,
    pub year: i32,
    pub price: f64,
    pub color: Option<String>,
    pub gearbox: Option<String>,
    /// Manufacturer name.
    pub manufacture: Option<String>,
    #[schema(value_type = Vec<String>)]
    pub images: Option<Vec<String>>,
}

#[derive(ToSchema)]
pub struct ManufactureForm {
    pub name: String,
    pub description: Option<String>,
    pub founder: Option<String>,
    pub director: Option<String>,
    pub website: Option<String>,
    #[schema(value_type = String, format = Binary)]
    pub image: Option<String>,
}

#[derive(ToSchema)]
pub struct RoleForm { pub name: String }

#[derive(ToSchema)]
#[schema(rename_all = "camelCase")]
pub struct UserForm {
    pub email: String,
    pub user_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password: String,
    pub email_confirmed: Option<bool>,
    /// Role names.
    pub roles: Option<Vec<String>>,
    #[schema(value_type = String, format = Binary)]
    pub image: Option<String>,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::health,
        crate::routes::metrics,
        crate::routes::account::login,
        crate::routes::account::me,
    ),
    components(
        schemas(
            HealthResponse,
            LoginRequest,
            EnvelopeDoc,
            CarForm,
            ManufactureForm,
            RoleForm,
            UserForm,
        )
    ),
    tags(
        (name = "health"),
        (name = "account"),
        (name = "car"),
        (name = "manufacture"),
        (name = "role"),
        (name = "user")
    )
)]
pub struct ApiDoc;

/// (tag, form schema) for every resource router.
const RESOURCES: [(&str, &str); 4] =
    [("car", "CarForm"), ("manufacture", "ManufactureForm"), ("role", "RoleForm"), ("user", "UserForm")];

fn operation(tag: &str, summary: &str, with_id: bool, form: Option<&str>) -> utoipa::openapi::path::Operation {
    let envelope = ResponseBuilder::new()
        .description("Envelope; failures carry a message and field errors")
        .content("application/json", ContentBuilder::new().schema(Ref::from_schema_name("EnvelopeDoc")).build())
        .build();
    let mut op = OperationBuilder::new()
        .tag(tag)
        .summary(Some(summary))
        .responses(ResponsesBuilder::new().response("200", envelope).build());
    if with_id {
        op = op.parameter(
            ParameterBuilder::new()
                .name("id")
                .parameter_in(ParameterIn::Path)
                .required(Required::True)
                .build(),
        );
    }
    if let Some(schema) = form {
        op = op.request_body(Some(
            RequestBodyBuilder::new()
                .content("multipart/form-data", ContentBuilder::new().schema(Ref::from_schema_name(schema)).build())
                .build(),
        ));
    }
    op.build()
}

/// The generated document plus the generic resource routes, which share
/// one handler set and so carry no per-route annotations.
pub fn document() -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    for (tag, form) in RESOURCES {
        let base = format!("/api/{tag}");
        let mut root = PathItem::new(PathItemType::Get, operation(tag, "List a page", false, None));
        root.operations.insert(PathItemType::Post, operation(tag, "Create (admin)", false, Some(form)));
        let list = PathItem::new(PathItemType::Get, operation(tag, "List a page", false, None));
        let mut by_id = PathItem::new(PathItemType::Get, operation(tag, "Get by id", true, None));
        by_id.operations.insert(PathItemType::Put, operation(tag, "Update (admin)", true, Some(form)));
        by_id.operations.insert(PathItemType::Delete, operation(tag, "Delete (admin)", true, None));
        doc.paths.paths.insert(base.clone(), root);
        doc.paths.paths.insert(format!("{base}/list"), list);
        doc.paths.paths.insert(format!("{base}/{{id}}"), by_id);
    }
    doc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_paths_are_documented() {
        let doc = document();
        for path in ["/api/car", "/api/car/{id}", "/api/user/list", "/api/account/login", "/health"] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
        let car = &doc.paths.paths["/api/car/{id}"];
        assert!(car.operations.contains_key(&PathItemType::Delete));
    }
}
