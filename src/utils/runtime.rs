use anyhow::Result;

/// The whole core is single threaded by design, a current thread runtime is
/// all it ever needs.
pub fn single_thread_runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}
