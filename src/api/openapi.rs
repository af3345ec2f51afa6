use super::{
    config::DEFAULT_ADMIN_PATH,
    handlers::{admin, health},
};
use crate::auth::AuthedItem;
use utoipa::{
    openapi::{Contact, License, Tag},
    OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        admin::signin,
        admin::signout,
        admin::current_session,
    ),
    components(schemas(
        health::Health,
        admin::SigninRequest,
        admin::SigninResponse,
        admin::SignoutResponse,
        AuthedItem,
    ))
)]
struct ApiDoc;

/// `OpenAPI` document for the routes this crate serves itself.
///
/// Admin routes are documented under the default `/admin` path; use
/// [`openapi_for`] when the admin UI is mounted elsewhere. The API mount is
/// provided by an external factory and is not documented here.
#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();

    // Use Cargo.toml metadata instead of the utoipa crate info defaults.
    doc.info.title = env!("CARGO_PKG_NAME").to_string();
    doc.info.version = env!("CARGO_PKG_VERSION").to_string();
    doc.info.description = optional_str(env!("CARGO_PKG_DESCRIPTION")).map(str::to_string);
    doc.info.contact = cargo_contact();
    doc.info.license = cargo_license();

    let mut health_tag = Tag::new("health");
    health_tag.description = Some("Liveness and build information".to_string());

    let mut admin_tag = Tag::new("admin");
    admin_tag.description = Some("Admin sign in, sign out and session".to_string());

    doc.tags = Some(vec![health_tag, admin_tag]);

    doc
}

/// [`openapi`] with the admin routes moved under `admin_path`.
#[must_use]
pub fn openapi_for(admin_path: &str) -> utoipa::openapi::OpenApi {
    let mut doc = openapi();
    if admin_path == DEFAULT_ADMIN_PATH {
        return doc;
    }

    let paths = std::mem::take(&mut doc.paths.paths);
    doc.paths.paths = paths
        .into_iter()
        .map(|(path, item)| match path.strip_prefix(DEFAULT_ADMIN_PATH) {
            Some(rest) if rest.starts_with('/') => (format!("{admin_path}{rest}"), item),
            _ => (path, item),
        })
        .collect();
    doc
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

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    match author.split_once('<') {
        Some((name, rest)) => {
            let email = rest.split('>').next().map(str::trim).and_then(optional_str);
            (optional_str(name.trim()), email)
        }
        None => (optional_str(author), None),
    }
}

fn optional_str(value: &str) -> Option<&str> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_documents_admin_routes() {
        let doc = openapi();
        assert_eq!(doc.info.title, env!("CARGO_PKG_NAME"));
        for path in ["/health", "/admin/signin", "/admin/signout", "/admin/session"] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn openapi_for_moves_admin_routes() {
        let doc = openapi_for("/cms");
        for path in ["/health", "/cms/signin", "/cms/signout", "/cms/session"] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
        assert!(!doc.paths.paths.keys().any(|path| path.starts_with("/admin")));

        let default = openapi_for(DEFAULT_ADMIN_PATH);
        assert!(default.paths.paths.contains_key("/admin/signin"));
    }

    #[test]
    fn parse_author_splits_name_and_email() {
        assert_eq!(
            parse_author("Team Keystone <team@keystone.dev>"),
            (Some("Team Keystone"), Some("team@keystone.dev"))
        );
        assert_eq!(parse_author("Solo"), (Some("Solo"), None));
    }
}
