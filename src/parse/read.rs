use anyhow::{Result, bail};
use std::path::Path;

const MMAP_THRESHOLD: u64 = 64 * 1024;
const MAX_FILE_SIZE: u64 = 1024 * 1024;

pub async fn read_source(path: &Path) -> Result<Vec<u8>> {
    let metadata = tokio::fs::metadata(path).await?;
    let size = metadata.len();

    if size > MAX_FILE_SIZE {
        bail!("file exceeds {} byte limit", MAX_FILE_SIZE);
    }

    let content = if size > MMAP_THRESHOLD {
        read_mmap(path).await?
    } else {
        tokio::fs::read(path).await?
    };

    if is_binary_content(&content) {
        bail!("binary content");
    }

    Ok(content)
}

async fn read_mmap(path: &Path) -> Result<Vec<u8>> {
    let path = path.to_path_buf();

    tokio::task::spawn_blocking(move || {
        let file = std::fs::File::open(&path)?;
        let mmap = unsafe { memmap2::Mmap::map(&file)? };
        Ok(mmap.to_vec())
    })
    .await?
}

pub fn is_binary_content(data: &[u8]) -> bool {
    let check_len = data.len().min(8192);
    memchr::memchr(0, &data[..check_len]).is_some()
}

pub fn count_lines(data: &[u8]) -> usize {
    memchr::memchr_iter(b'\n', data).count()
        + if data.last() != Some(&b'\n') && !data.is_empty() {
            1
        } else {
            0
        }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_sniff_finds_nul_bytes() {
        assert!(is_binary_content(b"abc\0def"));
        assert!(!is_binary_content(b"plain text"));
    }

    #[test]
    fn counts_lines_with_and_without_trailing_newline() {
        assert_eq!(count_lines(b"a\nb\n"), 2);
        assert_eq!(count_lines(b"a\nb"), 2);
        assert_eq!(count_lines(b""), 0);
    }
}
