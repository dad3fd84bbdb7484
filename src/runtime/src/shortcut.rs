//! Start Menu shortcut files.
//!
//! Writes Shell Link (`.lnk`) files directly. Only the pieces a launcher
//! shortcut needs are emitted: the header, the argument and icon strings,
//! and environment-variable blocks for the target and icon so paths like
//! `%SystemRoot%` are expanded by the shell when the link is opened.

use std::path::{Path, PathBuf};

use d2w_core::error::{ConvertError, Result};

/// Launcher the shortcut runs.
pub const WSL_TARGET: &str = r"%SystemRoot%\System32\wsl.exe";

/// Icon library the shortcut displays.
pub const SHELL_ICON_LIBRARY: &str = r"%SystemRoot%\System32\SHELL32.dll";

const HEADER_SIZE: u32 = 0x4C;
const LINK_CLSID: [u8; 16] = [
    0x01, 0x14, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0xC0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x46,
];

const HAS_ARGUMENTS: u32 = 0x0000_0020;
const HAS_ICON_LOCATION: u32 = 0x0000_0040;
const IS_UNICODE: u32 = 0x0000_0080;
const HAS_EXP_STRING: u32 = 0x0000_0200;
const HAS_EXP_ICON: u32 = 0x0000_4000;

const ENVIRONMENT_BLOCK_SIGNATURE: u32 = 0xA000_0001;
const ICON_ENVIRONMENT_BLOCK_SIGNATURE: u32 = 0xA000_0007;
const ENVIRONMENT_BLOCK_SIZE: u32 = 0x314;
const ANSI_PATH_LEN: usize = 260;
const UNICODE_PATH_LEN: usize = 520;

/// `SW_SHOWNORMAL`: the target opens in a normal window.
const SHOW_NORMAL: u32 = 1;

/// A shortcut to be written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shortcut {
    /// Where the `.lnk` file goes
    pub path: PathBuf,
    /// Target executable; may contain environment variable references
    pub target: String,
    pub arguments: String,
    /// Icon file; may contain environment variable references
    pub icon_location: String,
    pub icon_index: i32,
}

impl Shortcut {
    /// Shortcut at `path` that opens a session in distribution `name`.
    pub fn launch_distribution(path: impl Into<PathBuf>, name: &str) -> Self {
        Self {
            path: path.into(),
            target: WSL_TARGET.to_string(),
            arguments: format!("~ -d {name}"),
            icon_location: SHELL_ICON_LIBRARY.to_string(),
            icon_index: 0,
        }
    }
}

/// Persists shortcuts.
pub trait ShortcutWriter: Send + Sync {
    fn write(&self, shortcut: &Shortcut) -> Result<()>;
}

/// Writes shortcuts as Shell Link files.
#[derive(Debug, Clone, Copy, Default)]
pub struct LnkWriter;

impl ShortcutWriter for LnkWriter {
    fn write(&self, shortcut: &Shortcut) -> Result<()> {
        let bytes = encode_lnk(shortcut)?;

        if let Some(parent) = shortcut.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConvertError::ShortcutError(format!(
                    "failed to create {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        std::fs::write(&shortcut.path, bytes).map_err(|e| {
            ConvertError::ShortcutError(format!(
                "failed to write {}: {}",
                shortcut.path.display(),
                e
            ))
        })?;

        tracing::debug!(path = %shortcut.path.display(), "Wrote shortcut");
        Ok(())
    }
}

/// Serialize `shortcut` as a Shell Link.
pub fn encode_lnk(shortcut: &Shortcut) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(HEADER_SIZE as usize + 2 * ENVIRONMENT_BLOCK_SIZE as usize + 256);

    let flags = HAS_ARGUMENTS | HAS_ICON_LOCATION | IS_UNICODE | HAS_EXP_STRING | HAS_EXP_ICON;

    // ShellLinkHeader
    out.extend_from_slice(&HEADER_SIZE.to_le_bytes());
    out.extend_from_slice(&LINK_CLSID);
    out.extend_from_slice(&flags.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // file attributes
    out.extend_from_slice(&[0u8; 24]); // creation, access, write times
    out.extend_from_slice(&0u32.to_le_bytes()); // file size
    out.extend_from_slice(&shortcut.icon_index.to_le_bytes());
    out.extend_from_slice(&SHOW_NORMAL.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes()); // hot key
    out.extend_from_slice(&[0u8; 10]); // reserved

    // StringData, in the order the format requires
    write_string(&mut out, "arguments", &shortcut.arguments)?;
    write_string(&mut out, "icon location", &shortcut.icon_location)?;

    // ExtraData
    write_environment_block(&mut out, ENVIRONMENT_BLOCK_SIGNATURE, &shortcut.target)?;
    write_environment_block(&mut out, ICON_ENVIRONMENT_BLOCK_SIGNATURE, &shortcut.icon_location)?;
    out.extend_from_slice(&0u32.to_le_bytes());

    Ok(out)
}

fn write_string(out: &mut Vec<u8>, field: &str, value: &str) -> Result<()> {
    let units: Vec<u16> = value.encode_utf16().collect();
    let count = u16::try_from(units.len()).map_err(|_| {
        ConvertError::ShortcutError(format!("{field} too long ({} characters)", units.len()))
    })?;
    out.extend_from_slice(&count.to_le_bytes());
    for unit in units {
        out.extend_from_slice(&unit.to_le_bytes());
    }
    Ok(())
}

fn write_environment_block(out: &mut Vec<u8>, signature: u32, path: &str) -> Result<()> {
    let units: Vec<u16> = path.encode_utf16().collect();
    // Both fields are NUL-terminated within their fixed width.
    if units.len() >= ANSI_PATH_LEN || path.len() >= ANSI_PATH_LEN {
        return Err(ConvertError::ShortcutError(format!(
            "path too long for a shortcut: {path}"
        )));
    }

    out.extend_from_slice(&ENVIRONMENT_BLOCK_SIZE.to_le_bytes());
    out.extend_from_slice(&signature.to_le_bytes());

    let mut ansi = [0u8; ANSI_PATH_LEN];
    for (slot, c) in ansi.iter_mut().zip(path.chars()) {
        *slot = if c.is_ascii() { c as u8 } else { b'?' };
    }
    out.extend_from_slice(&ansi);

    let mut unicode = [0u8; UNICODE_PATH_LEN];
    for (slot, unit) in unicode.chunks_exact_mut(2).zip(units) {
        slot.copy_from_slice(&unit.to_le_bytes());
    }
    out.extend_from_slice(&unicode);
    Ok(())
}

/// Directory holding the current user's Start Menu program shortcuts.
pub fn start_menu_programs_dir(app_data: &Path) -> PathBuf {
    app_data
        .join("Microsoft")
        .join("Windows")
        .join("Start Menu")
        .join("Programs")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn u32_at(bytes: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
    }

    fn u16_at(bytes: &[u8], offset: usize) -> u16 {
        u16::from_le_bytes(bytes[offset..offset + 2].try_into().unwrap())
    }

    fn read_string(bytes: &[u8], offset: usize) -> (String, usize) {
        let count = u16_at(bytes, offset) as usize;
        let units: Vec<u16> = (0..count).map(|i| u16_at(bytes, offset + 2 + i * 2)).collect();
        (String::from_utf16(&units).unwrap(), offset + 2 + count * 2)
    }

    fn sample() -> Shortcut {
        Shortcut::launch_distribution("dist.lnk", "dist")
    }

    #[test]
    fn test_launch_distribution_fields() {
        let s = sample();
        assert_eq!(s.target, r"%SystemRoot%\System32\wsl.exe");
        assert_eq!(s.arguments, "~ -d dist");
        assert_eq!(s.icon_location, r"%SystemRoot%\System32\SHELL32.dll");
        assert_eq!(s.icon_index, 0);
    }

    #[test]
    fn test_header() {
        let bytes = encode_lnk(&sample()).unwrap();
        assert_eq!(u32_at(&bytes, 0), 0x4C);
        assert_eq!(&bytes[4..20], &LINK_CLSID);
        let flags = u32_at(&bytes, 20);
        assert_eq!(flags, 0x20 | 0x40 | 0x80 | 0x200 | 0x4000);
        // icon index, show command
        assert_eq!(u32_at(&bytes, 56), 0);
        assert_eq!(u32_at(&bytes, 60), 1);
    }

    #[test]
    fn test_string_data_and_blocks() {
        let shortcut = sample();
        let bytes = encode_lnk(&shortcut).unwrap();

        let (arguments, next) = read_string(&bytes, 76);
        assert_eq!(arguments, "~ -d dist");
        let (icon, next) = read_string(&bytes, next);
        assert_eq!(icon, shortcut.icon_location);

        assert_eq!(u32_at(&bytes, next), 0x314);
        assert_eq!(u32_at(&bytes, next + 4), 0xA000_0001);
        let ansi = &bytes[next + 8..next + 8 + shortcut.target.len()];
        assert_eq!(ansi, shortcut.target.as_bytes());
        assert_eq!(bytes[next + 8 + shortcut.target.len()], 0);

        let icon_block = next + 0x314;
        assert_eq!(u32_at(&bytes, icon_block), 0x314);
        assert_eq!(u32_at(&bytes, icon_block + 4), 0xA000_0007);

        let terminal = icon_block + 0x314;
        assert_eq!(u32_at(&bytes, terminal), 0);
        assert_eq!(bytes.len(), terminal + 4);
    }

    #[test]
    fn test_unicode_name_in_arguments() {
        let shortcut = Shortcut::launch_distribution("x.lnk", "Ŝdev");
        let bytes = encode_lnk(&shortcut).unwrap();
        let (arguments, _) = read_string(&bytes, 76);
        assert_eq!(arguments, "~ -d Ŝdev");
    }

    #[test]
    fn test_overlong_target_rejected() {
        let mut shortcut = sample();
        shortcut.target = "C:\\".to_string() + &"a".repeat(300);
        let err = encode_lnk(&shortcut).unwrap_err();
        assert!(matches!(err, ConvertError::ShortcutError(_)));
    }

    #[test]
    fn test_writer_creates_parent_dirs() {
        let tmp = TempDir::new().unwrap();
        let programs = start_menu_programs_dir(tmp.path());
        let path = programs.join("dist.lnk");

        LnkWriter
            .write(&Shortcut::launch_distribution(&path, "dist"))
            .unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(u32_at(&bytes, 0), 0x4C);
    }

    #[test]
    fn test_writer_overwrites_existing() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("dist.lnk");
        std::fs::write(&path, b"stale").unwrap();

        LnkWriter
            .write(&Shortcut::launch_distribution(&path, "dist"))
            .unwrap();
        assert!(std::fs::read(&path).unwrap().len() > 76);
    }

    #[test]
    fn test_programs_dir_layout() {
        let dir = start_menu_programs_dir(Path::new("/appdata"));
        assert!(dir.ends_with(Path::new("Microsoft/Windows/Start Menu/Programs")));
    }
}
