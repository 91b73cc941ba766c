use std::path::Path;

use rand::Rng;

/// Resolve the cookie-signing secret. A configured value (shared with the
/// web application) wins; otherwise load or generate a random secret under
/// data_dir so standalone deployments work out of the box.
pub fn load_or_generate_session_secret(
    configured: &str,
    data_dir: &str,
) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    if !configured.is_empty() {
        return Ok(configured.as_bytes().to_vec());
    }

    let key_path = Path::new(data_dir).join("session_secret");

    if key_path.exists() {
        let key = std::fs::read(&key_path)?;
        if key.len() == 32 {
            tracing::info!("Session secret loaded from {}", key_path.display());
            return Ok(key);
        }
        tracing::warn!("Session secret file has wrong size ({}), regenerating", key.len());
    }

    // Generate new 256-bit random secret
    let key: [u8; 32] = rand::rng().random();
    std::fs::write(&key_path, key)?;
    tracing::info!("Session secret generated at {}", key_path.display());
    Ok(key.to_vec())
}
