use super::handlers::{auth, health, notes};
use utoipa::openapi::{
    Components, Contact, InfoBuilder, License, OpenApiBuilder, Tag,
    security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};
use utoipa_axum::{router::OpenApiRouter, routes};

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    // Reuse the same router wiring and only return the generated OpenAPI spec.
    let (_public, mut openapi) = public_router().split_for_parts();
    let (_protected, protected) = protected_router().split_for_parts();
    openapi.merge(protected);
    openapi
}

/// Routes reachable without a bearer token.
///
/// Add new endpoints here via `.routes(routes!(...))` so they are both served
/// and included in the generated `OpenAPI` spec.
pub(crate) fn public_router() -> OpenApiRouter {
    // `routes!` reads #[utoipa::path] to bind HTTP method + path and add the route to OpenAPI.
    OpenApiRouter::with_openapi(documented_openapi())
        .routes(routes!(health::health))
        .routes(routes!(auth::register::register))
        .routes(routes!(auth::login::login))
        .routes(routes!(auth::google::google_start))
        .routes(routes!(auth::google::google_callback))
        .routes(routes!(auth::google::google_failure))
}

/// Routes served behind the bearer guard.
pub(crate) fn protected_router() -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(auth::me::me))
        .routes(routes!(auth::me::profile))
        .routes(routes!(auth::me::logout))
        .routes(routes!(notes::list_active, notes::create_note))
        .routes(routes!(notes::list_archived))
        .routes(routes!(notes::list_trash))
        .routes(routes!(notes::stats))
        .routes(routes!(notes::get_note, notes::update_note, notes::delete_note))
        .routes(routes!(notes::archive_note))
        .routes(routes!(notes::unarchive_note))
        .routes(routes!(notes::trash_note))
        .routes(routes!(notes::restore_note))
}

/// Base document: Cargo metadata, tags and the `bearer` security scheme.
fn documented_openapi() -> utoipa::openapi::OpenApi {
    let mut openapi = cargo_openapi();

    let mut health_tag = Tag::new("health");
    health_tag.description = Some("Build info and storage reachability".to_string());

    let mut auth_tag = Tag::new("auth");
    auth_tag.description = Some("Password and Google sign-in, current user".to_string());

    let mut notes_tag = Tag::new("notes");
    notes_tag.description = Some("Owner-scoped notes and status transitions".to_string());

    openapi.tags = Some(vec![health_tag, auth_tag, notes_tag]);
    openapi
        .components
        .get_or_insert_with(Components::new)
        .add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    openapi
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
    // Use Cargo.toml metadata instead of the utoipa-axum crate info defaults.
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    info.contact = cargo_contact();
    info.license = cargo_license();

    OpenApiBuilder::new().info(info).build()
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let authors = env!("CARGO_PKG_AUTHORS");
    let primary = authors.split(';').next().map(str::trim)?;
    if primary.is_empty() {
        return None;
    }

    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn optional_str(value: &'static str) -> Option<&'static str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    if let Some(start) = author.find('<') {
        let name = author[..start].trim();
        let email = author[start + 1..].trim_end_matches('>').trim();
        let name = if name.is_empty() { None } else { Some(name) };
        let email = if email.is_empty() { None } else { Some(email) };
        (name, email)
    } else {
        let name = author.trim();
        (if name.is_empty() { None } else { Some(name) }, None)
    }
}
