use anyhow::{Context, Result};
use keystone::api::config::{validate_mount_path, DEFAULT_ADMIN_PATH};

fn main() -> Result<()> {
    let admin_path =
        std::env::var("KEYSTONE_ADMIN_PATH").unwrap_or_else(|_| DEFAULT_ADMIN_PATH.to_string());
    validate_mount_path("KEYSTONE_ADMIN_PATH", &admin_path).context("Invalid admin path")?;

    let doc = keystone::api::openapi_for(&admin_path);
    let json = serde_json::to_string_pretty(&doc)?;
    println!("{json}");
    Ok(())
}
