//! Keeps the link-edit segment and the string table of a Mach-O executable
//! extending to the end of the file after an archive has been appended,
//! so that code-signing tools accept the result.
//!
//! Only thin 64-bit little-endian images are handled. Anything else,
//! including universal binaries and images with more than one link-edit
//! segment or symbol table, is left alone.

use std::{
    fs::{read, write},
    mem::size_of,
    path::Path,
};

use zerocopy::{
    byteorder::little_endian::{U32, U64},
    FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
};

use crate::error::{Error, Result};

pub const MH_MAGIC_64: u32 = 0xfeed_facf;
pub const LC_SYMTAB: u32 = 0x2;
pub const LC_SEGMENT_64: u32 = 0x19;
pub const SEG_LINKEDIT: [u8; 16] = *b"__LINKEDIT\0\0\0\0\0\0";
const COMMAND_ALIGNMENT: usize = 8;

#[repr(C)]
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned, Clone, Copy, Debug, Default)]
pub struct MachHeader64 {
    pub magic:      U32,
    pub cputype:    U32,
    pub cpusubtype: U32,
    pub filetype:   U32,
    pub ncmds:      U32,
    pub sizeofcmds: U32,
    pub flags:      U32,
    pub reserved:   U32,
}

#[repr(C)]
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned, Clone, Copy, Debug, Default)]
pub struct LoadCommand {
    pub cmd:     U32,
    pub cmdsize: U32,
}

#[repr(C)]
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned, Clone, Copy, Debug, Default)]
pub struct SegmentCommand64 {
    pub cmd:      U32,
    pub cmdsize:  U32,
    pub segname:  [u8; 16],
    pub vmaddr:   U64,
    pub vmsize:   U64,
    pub fileoff:  U64,
    pub filesize: U64,
    pub maxprot:  U32,
    pub initprot: U32,
    pub nsects:   U32,
    pub flags:    U32,
}

#[repr(C)]
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned, Clone, Copy, Debug, Default)]
pub struct SymtabCommand {
    pub cmd:     U32,
    pub cmdsize: U32,
    pub symoff:  U32,
    pub nsyms:   U32,
    pub stroff:  U32,
    pub strsize: U32,
}

/// Which fields were rewritten.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MachoPatch {
    pub segment: bool,
    pub symtab:  bool,
}
impl MachoPatch {
    pub fn is_empty(&self) -> bool { !self.segment && !self.symtab }
}

#[derive(Default)]
struct Layout {
    linkedit: Vec<usize>,
    symtab:   Vec<usize>,
}

fn align_up(value: usize, alignment: usize) -> usize { (value + alignment - 1) / alignment * alignment }

/// Offsets of the link-edit segment and symbol table commands, or `None`
/// when the load command table is not a well-formed thin 64-bit table.
fn scan(data: &[u8]) -> Option<Layout> {
    let (header, _) = MachHeader64::read_from_prefix(data).ok()?;
    if header.magic.get() != MH_MAGIC_64 {
        return None;
    }
    let mut offset = size_of::<MachHeader64>();
    let end = offset.checked_add(header.sizeofcmds.get() as usize)?;
    if end > data.len() {
        return None;
    }
    let mut layout = Layout::default();
    for _ in 0..header.ncmds.get() {
        let (command, _) = LoadCommand::read_from_prefix(data.get(offset..end)?).ok()?;
        let size = command.cmdsize.get() as usize;
        if size < size_of::<LoadCommand>() || offset.checked_add(size)? > end {
            return None;
        }
        match command.cmd.get() {
            LC_SEGMENT_64 if size >= size_of::<SegmentCommand64>() => {
                let (segment, _) = SegmentCommand64::read_from_prefix(&data[offset..]).ok()?;
                if segment.segname == SEG_LINKEDIT {
                    layout.linkedit.push(offset);
                }
            }
            LC_SYMTAB if size >= size_of::<SymtabCommand>() => layout.symtab.push(offset),
            _ => {}
        }
        offset += align_up(size, COMMAND_ALIGNMENT);
    }
    Some(layout)
}

/// Extend the link-edit segment and the string table of the Mach-O image in
/// `data` up to the end of the buffer.
pub fn extend_linkedit(data: &mut [u8]) -> MachoPatch {
    let mut patch = MachoPatch::default();
    let layout = match scan(data) {
        Some(layout) => layout,
        None => return patch,
    };
    let file_len = data.len() as u64;

    if let &[offset] = layout.linkedit.as_slice() {
        let end = offset + size_of::<SegmentCommand64>();
        if let Ok(mut segment) = SegmentCommand64::read_from_bytes(&data[offset..end]) {
            let fileoff = segment.fileoff.get();
            if fileoff <= file_len {
                segment.filesize = U64::new(file_len - fileoff);
                segment.vmsize = U64::new(file_len - fileoff);
                data[offset..end].copy_from_slice(segment.as_bytes());
                patch.segment = true;
            }
        }
    }

    if let &[offset] = layout.symtab.as_slice() {
        let end = offset + size_of::<SymtabCommand>();
        if let Ok(mut symtab) = SymtabCommand::read_from_bytes(&data[offset..end]) {
            let stroff = symtab.stroff.get() as u64;
            if let Some(strsize) = file_len
                .checked_sub(stroff)
                .and_then(|size| u32::try_from(size).ok())
            {
                symtab.strsize = U32::new(strsize);
                data[offset..end].copy_from_slice(symtab.as_bytes());
                patch.symtab = true;
            }
        }
    }

    patch
}

/// Patch the composed executable at `path` in place. Must run after the
/// archive has been appended, since it depends on the final file length.
pub fn extend_string_table_size(path: &Path) -> Result<MachoPatch> {
    let mut data = read(path).map_err(Error::io("read", path))?;
    let patch = extend_linkedit(&mut data);
    if !patch.is_empty() {
        write(path, &data).map_err(Error::io("write", path))?;
    }
    Ok(patch)
}
