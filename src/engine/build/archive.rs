//! Tar packing of an image build context.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::fs::Metadata;
use cap_std::fs_utf8::Dir;
use tar::{Builder, EntryType, Header};

/// Top-level context entries never sent to the engine.
const EXCLUDED_AT_ROOT: &[&str] = &[".git"];

const SYMLINK_MODE: u32 = 0o777;

/// Pack the build context below `context` into a tar archive.
///
/// Paths are relative to the context root and entries are written in name
/// order, so the same tree always produces the same archive. Symlinks are
/// stored as links with their target unchanged; sockets and other special
/// files are skipped. Only the root `.git` directory is left out.
pub(super) fn build_context_archive(context: &Dir) -> io::Result<Vec<u8>> {
    let mut packer = ContextPacker {
        builder: Builder::new(vec![]),
    };
    packer.pack_dir(context, Utf8Path::new(""))?;
    packer.builder.into_inner()
}

enum ContextEntry {
    Dir,
    File,
    Symlink(Utf8PathBuf),
}

struct ContextPacker {
    builder: Builder<Vec<u8>>,
}

impl ContextPacker {
    fn pack_dir(&mut self, dir: &Dir, prefix: &Utf8Path) -> io::Result<()> {
        for (name, kind) in list_dir(dir, prefix.as_str().is_empty())? {
            let path = prefix.join(&name);
            match kind {
                ContextEntry::Dir => {
                    let metadata = dir.metadata(&name)?;
                    self.append(&path, EntryType::Directory, &metadata, io::empty())?;
                    self.pack_dir(&dir.open_dir(&name)?, &path)?;
                }
                ContextEntry::File => {
                    let metadata = dir.metadata(&name)?;
                    let file = dir.open(&name)?;
                    self.append(&path, EntryType::Regular, &metadata, file)?;
                }
                ContextEntry::Symlink(target) => {
                    let mut header = Header::new_gnu();
                    header.set_entry_type(EntryType::Symlink);
                    header.set_size(0);
                    header.set_mode(SYMLINK_MODE);
                    self.builder
                        .append_link(&mut header, tar_path(&path), target.as_str())?;
                }
            }
        }
        Ok(())
    }

    fn append<R: io::Read>(
        &mut self,
        path: &Utf8Path,
        kind: EntryType,
        metadata: &Metadata,
        contents: R,
    ) -> io::Result<()> {
        let mut header = Header::new_gnu();
        header.set_entry_type(kind);
        header.set_size(if kind.is_dir() { 0 } else { metadata.len() });
        header.set_mode(mode_of(metadata, kind));
        let name = if kind.is_dir() {
            format!("{}/", tar_path(path))
        } else {
            tar_path(path)
        };
        self.builder.append_data(&mut header, name, contents)
    }
}

/// Entries of `dir` sorted by name, with their kind resolved.
fn list_dir(dir: &Dir, at_root: bool) -> io::Result<Vec<(String, ContextEntry)>> {
    let mut listed = vec![];
    for listed_entry in dir.entries()? {
        let entry = listed_entry?;
        let name = entry.file_name()?;
        if at_root && EXCLUDED_AT_ROOT.contains(&name.as_str()) {
            continue;
        }
        let file_type = entry.file_type()?;
        let kind = if file_type.is_symlink() {
            ContextEntry::Symlink(dir.read_link_contents(&name)?)
        } else if file_type.is_dir() {
            ContextEntry::Dir
        } else if file_type.is_file() {
            ContextEntry::File
        } else {
            continue;
        };
        listed.push((name, kind));
    }
    listed.sort_unstable_by(|(left, _), (right, _)| left.cmp(right));
    Ok(listed)
}

fn tar_path(path: &Utf8Path) -> String {
    path.as_str().replace('\\', "/")
}

#[cfg(unix)]
fn mode_of(metadata: &Metadata, _kind: EntryType) -> u32 {
    use cap_std::fs::PermissionsExt;

    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn mode_of(_metadata: &Metadata, kind: EntryType) -> u32 {
    if kind.is_dir() { 0o755 } else { 0o644 }
}
