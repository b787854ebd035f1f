use anyhow::{Context, Result};
use dialoguer::{Input, Password};
use infaq_api::{DEFAULT_CAMERA_NAME, LoginRequest, RegisterMasjidRequest};

use crate::context::AppContext;

fn prompt_username(username: Option<String>) -> Result<String> {
    match username {
        Some(u) => Ok(u),
        None => Input::new()
            .with_prompt("Username")
            .interact_text()
            .context("Failed to read username"),
    }
}

/// Password from the flag, then `INFAQ_PASSWORD`, then an interactive prompt.
fn prompt_password(password: Option<String>, confirm: bool) -> Result<String> {
    if let Some(p) = password.or_else(|| std::env::var("INFAQ_PASSWORD").ok()) {
        return Ok(p);
    }
    let mut prompt = Password::new().with_prompt("Password");
    if confirm {
        prompt = prompt.with_confirmation("Repeat password", "Passwords do not match");
    }
    prompt.interact().context("Failed to read password")
}

pub async fn run_login(ctx: &AppContext, username: Option<String>, password: Option<String>) -> Result<()> {
    let req = LoginRequest {
        username: prompt_username(username)?,
        password: prompt_password(password, false)?,
    };
    ctx.api.login(&req).await.context("Login failed")?;
    ctx.sync_token();
    println!("Logged in as {} ({})", req.username, ctx.config.auth_base());
    Ok(())
}

pub struct RegisterArgs {
    pub nama_masjid: String,
    pub alamat: Option<String>,
    pub tg_chat_id: Option<String>,
    pub camera_nama: Option<String>,
    pub camera_url: String,
    pub username: String,
    pub password: Option<String>,
}

pub async fn run_register(ctx: &AppContext, args: RegisterArgs) -> Result<()> {
    let req = RegisterMasjidRequest {
        nama_masjid: args.nama_masjid,
        alamat: args.alamat,
        tg_chat_id: args.tg_chat_id,
        camera_nama: args
            .camera_nama
            .unwrap_or_else(|| DEFAULT_CAMERA_NAME.to_string()),
        camera_url: args.camera_url,
        username: args.username,
        password: prompt_password(args.password, true)?,
    };
    let resp = ctx
        .api
        .register_masjid(&req)
        .await
        .context("Registration failed")?;
    println!("Registered masjid #{} ({})", resp.masjid_id, req.nama_masjid);
    println!("  admin:  {}", resp.admin_username);
    if let Some(camera_id) = resp.camera_id {
        println!(
            "  camera: #{camera_id} {} {}",
            resp.camera_source_type.as_deref().unwrap_or("-"),
            resp.camera_source_path.as_deref().unwrap_or("-"),
        );
    }
    println!("Run `infaq login --username {}` to continue.", resp.admin_username);
    Ok(())
}

pub async fn run_logout(ctx: &AppContext) -> Result<()> {
    let (monitor, task) = ctx.spawn_monitor(None);
    ctx.controller(monitor).logout().await;
    let _ = task.await;
    ctx.sync_token();
    println!("Logged out.");
    Ok(())
}
