pub mod artifact;
pub mod chat;
pub mod config;
pub mod status;
pub mod up;

/// Current-thread runtime for one-shot async commands.
pub(crate) fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}
