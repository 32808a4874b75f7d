use anyhow::Context;
use tracing::instrument;

/// Copies the permission bits of `src` onto `dst`.
#[instrument]
pub fn copy_permissions(src: &std::path::Path, dst: &std::path::Path) -> anyhow::Result<()> {
    let metadata = std::fs::metadata(src)
        .with_context(|| format!("failed reading metadata from {:?}", &src))?;
    let permissions = metadata.permissions();
    std::fs::set_permissions(dst, permissions.clone())
        .with_context(|| format!("cannot set {:?} permissions to {:?}", &dst, &permissions))?;
    Ok(())
}
