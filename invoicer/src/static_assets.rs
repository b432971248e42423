//! Embedded static assets (stylesheet, scripts, icons) served under `/static/`.

use rust_embed::RustEmbed;

#[derive(RustEmbed)]
#[folder = "static/"]
pub struct Assets;
