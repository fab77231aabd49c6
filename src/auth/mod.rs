//! Session storage (encrypted file-based key-value store)
//!
//! Stores the verified session encrypted with AES-256-GCM in
//! ~/.config/margin/session.enc. The encryption key is derived from
//! machine-specific identifiers.

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use anyhow::{Context, Result};
use rand::Rng;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::api::TokenProvider;
use crate::models::Session;
use crate::paths;

const NONCE_SIZE: usize = 12;

const KEY_TOKEN: &str = "token";
const KEY_USERNAME: &str = "username";
const KEY_DISPLAY_NAME: &str = "display_name";
const KEY_AVATAR_URL: &str = "avatar_url";

/// Get machine ID for key derivation (cross-platform)
fn get_machine_id() -> String {
    // Linux: /etc/machine-id or /var/lib/dbus/machine-id
    #[cfg(target_os = "linux")]
    {
        if let Ok(id) = fs::read_to_string("/etc/machine-id") {
            return id.trim().to_string();
        }
        if let Ok(id) = fs::read_to_string("/var/lib/dbus/machine-id") {
            return id.trim().to_string();
        }
    }

    // macOS: IOPlatformUUID via ioreg
    #[cfg(target_os = "macos")]
    {
        if let Ok(output) = std::process::Command::new("ioreg")
            .args(["-rd1", "-c", "IOPlatformExpertDevice"])
            .output()
        {
            let stdout = String::from_utf8_lossy(&output.stdout);
            for line in stdout.lines() {
                if line.contains("IOPlatformUUID") {
                    if let Some(uuid) = line.split('"').nth(3) {
                        return uuid.to_string();
                    }
                }
            }
        }
    }

    // Fallback: home directory path
    dirs::home_dir()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|| "margin-fallback-key".to_string())
}

/// Derive encryption key from machine-specific data
fn derive_key() -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(get_machine_id().as_bytes());
    if let Some(home) = dirs::home_dir() {
        hasher.update(home.to_string_lossy().as_bytes());
    }
    hasher.update(b"margin-microblog-client-v1");
    hasher.finalize().into()
}

/// Read and decrypt the key-value map
fn read_map(path: &Path) -> Result<HashMap<String, String>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }

    let encrypted = fs::read(path).context("Failed to read session file")?;
    if encrypted.len() < NONCE_SIZE {
        return Ok(HashMap::new());
    }

    let (nonce_bytes, ciphertext) = encrypted.split_at(NONCE_SIZE);
    let nonce = Nonce::from_slice(nonce_bytes);

    let cipher = Aes256Gcm::new_from_slice(&derive_key())
        .map_err(|_| anyhow::anyhow!("Invalid key length"))?;
    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| anyhow::anyhow!("Failed to decrypt session file"))?;

    let json = String::from_utf8(plaintext).context("Invalid UTF-8 in session file")?;
    Ok(serde_json::from_str(&json)?)
}

/// Encrypt and write the key-value map
fn write_map(path: &Path, map: &HashMap<String, String>) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create session directory")?;
    }

    let json = serde_json::to_string(map)?;
    let cipher = Aes256Gcm::new_from_slice(&derive_key())
        .map_err(|_| anyhow::anyhow!("Invalid key length"))?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::rng().fill(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, json.as_bytes())
        .map_err(|_| anyhow::anyhow!("Failed to encrypt session"))?;

    let mut output = nonce_bytes.to_vec();
    output.extend(ciphertext);
    fs::write(path, output).context("Failed to write session file")?;

    // Set restrictive permissions on Unix
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(path)?.permissions();
        perms.set_mode(0o600);
        fs::set_permissions(path, perms)?;
    }

    Ok(())
}

fn session_from_map(mut map: HashMap<String, String>) -> Option<Session> {
    let token = map.remove(KEY_TOKEN).filter(|t| !t.trim().is_empty())?;
    let username = map.remove(KEY_USERNAME).unwrap_or_default();
    Some(Session {
        token,
        display_name: map
            .remove(KEY_DISPLAY_NAME)
            .unwrap_or_else(|| username.clone()),
        username,
        avatar_url: map.remove(KEY_AVATAR_URL),
    })
}

fn session_to_map(session: &Session) -> HashMap<String, String> {
    let mut map = HashMap::new();
    map.insert(KEY_TOKEN.to_string(), session.token.clone());
    map.insert(KEY_USERNAME.to_string(), session.username.clone());
    map.insert(KEY_DISPLAY_NAME.to_string(), session.display_name.clone());
    if let Some(avatar) = &session.avatar_url {
        map.insert(KEY_AVATAR_URL.to_string(), avatar.clone());
    }
    map
}

/// Persistent session, read once at startup and cached in memory
pub struct SessionStore {
    path: PathBuf,
    current: RwLock<Option<Session>>,
}

impl SessionStore {
    /// Open the store at the default location
    pub fn open_default() -> Result<Self> {
        Self::open(&paths::session_path()?)
    }

    /// Open the store at a specific path.
    ///
    /// An unreadable or undecryptable file is treated as "signed out".
    pub fn open(path: &Path) -> Result<Self> {
        let current = match read_map(path) {
            Ok(map) => session_from_map(map),
            Err(e) => {
                tracing::warn!("Ignoring unreadable session file {}: {e:#}", path.display());
                None
            }
        };

        Ok(Self {
            path: path.to_path_buf(),
            current: RwLock::new(current),
        })
    }

    /// The stored session, if signed in
    pub fn session(&self) -> Option<Session> {
        self.current.read().ok().and_then(|s| s.clone())
    }

    /// Whether a session is stored
    pub fn is_signed_in(&self) -> bool {
        self.session().is_some()
    }

    /// Persist a new session
    pub fn save(&self, session: &Session) -> Result<()> {
        write_map(&self.path, &session_to_map(session))?;
        if let Ok(mut current) = self.current.write() {
            *current = Some(session.clone());
        }
        tracing::debug!(username = %session.username, "session saved");
        Ok(())
    }

    /// Forget the session (logout or failed verification)
    pub fn clear(&self) -> Result<()> {
        if let Ok(mut current) = self.current.write() {
            *current = None;
        }
        if self.path.exists() {
            fs::remove_file(&self.path).context("Failed to remove session file")?;
        }
        tracing::debug!("session cleared");
        Ok(())
    }

    /// Where the session lives on disk
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenProvider for SessionStore {
    fn bearer_token(&self) -> Option<String> {
        self.session().map(|s| s.token)
    }
}
