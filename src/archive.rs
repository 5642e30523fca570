use std::fs;
use std::io::Read;
use std::path::Path;

use zip::ZipArchive;
use zip::result::ZipError;

use crate::error::InsiderError;

/// Upper bound on the buffer reserved from a member's declared size. Larger
/// members still read fully; the buffer grows as bytes arrive.
pub const MAX_PREALLOCATION: u64 = 64 * 1024 * 1024;

/// Lines of one archive member. The member is decoded up front; iteration
/// walks the buffer once and cannot be restarted.
#[derive(Debug)]
pub struct MemberLines {
    text: String,
    offset: usize,
}

impl MemberLines {
    pub fn from_text(text: String) -> Self {
        Self { text, offset: 0 }
    }
}

impl Iterator for MemberLines {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.offset >= self.text.len() {
            return None;
        }
        let rest = &self.text[self.offset..];
        let (line, consumed) = match rest.find('\n') {
            Some(end) => (&rest[..end], end + 1),
            None => (rest, rest.len()),
        };
        let line = line.strip_suffix('\r').unwrap_or(line).to_string();
        self.offset += consumed;
        Some(line)
    }
}

/// Opens `member` inside the zip at `archive_path` and reads it whole.
pub fn open_member(archive_path: &Path, member: &str) -> Result<MemberLines, InsiderError> {
    let archive_err = |message: String| InsiderError::Archive {
        path: archive_path.to_path_buf(),
        message,
    };

    let file = fs::File::open(archive_path).map_err(|err| archive_err(err.to_string()))?;
    let mut archive = ZipArchive::new(file).map_err(|err| archive_err(err.to_string()))?;
    let mut entry = archive.by_name(member).map_err(|err| match err {
        ZipError::FileNotFound => InsiderError::MissingMember {
            path: archive_path.to_path_buf(),
            member: member.to_string(),
        },
        other => archive_err(other.to_string()),
    })?;

    let mut bytes = Vec::with_capacity(initial_capacity(entry.size()));
    entry
        .read_to_end(&mut bytes)
        .map_err(|err| archive_err(format!("{member}: {err}")))?;
    let text = String::from_utf8(bytes)
        .map_err(|err| archive_err(format!("{member} is not UTF-8: {err}")))?;
    Ok(MemberLines::from_text(text))
}

/// Buffer size to reserve for a member declaring `declared` bytes. The header
/// value is untrusted.
pub fn initial_capacity(declared: u64) -> usize {
    usize::try_from(declared.min(MAX_PREALLOCATION)).unwrap_or(0)
}

/// Confirms the archive opens and carries every member in `members`.
pub fn validate_archive(archive_path: &Path, members: &[&str]) -> Result<(), InsiderError> {
    let file = fs::File::open(archive_path).map_err(|err| InsiderError::Archive {
        path: archive_path.to_path_buf(),
        message: err.to_string(),
    })?;
    let archive = ZipArchive::new(file).map_err(|err| InsiderError::Archive {
        path: archive_path.to_path_buf(),
        message: err.to_string(),
    })?;
    for member in members {
        if archive.index_for_name(member).is_none() {
            return Err(InsiderError::MissingMember {
                path: archive_path.to_path_buf(),
                member: member.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_strip_crlf_and_keep_empty_lines() {
        let lines: Vec<String> = MemberLines::from_text("a\tb\r\n\nc".to_string()).collect();
        assert_eq!(lines, vec!["a\tb", "", "c"]);
    }

    #[test]
    fn declared_size_does_not_drive_allocation() {
        assert_eq!(initial_capacity(1024), 1024);
        assert_eq!(initial_capacity(u64::MAX), MAX_PREALLOCATION as usize);
        assert_eq!(initial_capacity(0), 0);
    }

    #[test]
    fn trailing_newline_does_not_yield_extra_line() {
        let lines: Vec<String> = MemberLines::from_text("h\nr\n".to_string()).collect();
        assert_eq!(lines, vec!["h", "r"]);
    }
}
