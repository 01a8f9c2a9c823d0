use goblin::elf::header::{EM_386, EM_AARCH64, EM_X86_64};
use goblin::elf::Elf;
use goblin::mach::cputype::{CPU_TYPE_ARM64, CPU_TYPE_X86, CPU_TYPE_X86_64};
use goblin::pe::header::{COFF_MACHINE_ARM64, COFF_MACHINE_X86, COFF_MACHINE_X86_64};
use goblin::Hint;
use scroll::Pread;

use crate::core::platform::TargetArch;

/// Bytes of each archive member read for header inspection.
pub const HEADER_PREFIX_LEN: usize = 4096;

/// Fat Mach-O stores an architecture count after `CAFEBABE`; class files
/// store their version word there, which is always larger.
const FAT_MAX_ARCHS: usize = 20;

/// What a member's leading bytes say about it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderKind {
    Native(TargetArch),
    /// A native binary for a machine no target maps to (ARM32, RISC-V, ...).
    Foreign,
    /// Fat Mach-O: carries slices for several architectures.
    Universal,
    JavaClass,
    Unrecognized,
}

pub fn inspect_header(bytes: &[u8]) -> HeaderKind {
    let Some(head) = bytes.get(..16).and_then(|b| <&[u8; 16]>::try_from(b).ok()) else {
        return HeaderKind::Unrecognized;
    };

    match goblin::peek_bytes(head) {
        Ok(Hint::Elf(_)) => inspect_elf(bytes),
        Ok(Hint::PE) => inspect_pe(bytes),
        Ok(Hint::Mach(_)) => inspect_macho(bytes),
        Ok(Hint::MachFat(count)) if count < FAT_MAX_ARCHS => HeaderKind::Universal,
        Ok(Hint::MachFat(_)) => HeaderKind::JavaClass,
        _ => HeaderKind::Unrecognized,
    }
}

fn inspect_elf(bytes: &[u8]) -> HeaderKind {
    match Elf::parse_header(bytes) {
        Ok(header) => match header.e_machine {
            EM_X86_64 => HeaderKind::Native(TargetArch::Bits64),
            EM_AARCH64 => HeaderKind::Native(TargetArch::Arm64),
            EM_386 => HeaderKind::Native(TargetArch::Bits32),
            _ => HeaderKind::Foreign,
        },
        Err(_) => HeaderKind::Unrecognized,
    }
}

fn inspect_pe(bytes: &[u8]) -> HeaderKind {
    match goblin::pe::header::Header::parse(bytes) {
        Ok(header) => match header.coff_header.machine {
            COFF_MACHINE_X86_64 => HeaderKind::Native(TargetArch::Bits64),
            COFF_MACHINE_ARM64 => HeaderKind::Native(TargetArch::Arm64),
            COFF_MACHINE_X86 => HeaderKind::Native(TargetArch::Bits32),
            _ => HeaderKind::Foreign,
        },
        Err(_) => HeaderKind::Unrecognized,
    }
}

fn inspect_macho(bytes: &[u8]) -> HeaderKind {
    let Ok((_, Some(ctx))) = goblin::mach::parse_magic_and_ctx(bytes, 0) else {
        return HeaderKind::Unrecognized;
    };
    match bytes.pread_with::<goblin::mach::header::Header>(0, ctx) {
        Ok(header) => match header.cputype {
            CPU_TYPE_X86_64 => HeaderKind::Native(TargetArch::Bits64),
            CPU_TYPE_ARM64 => HeaderKind::Native(TargetArch::Arm64),
            CPU_TYPE_X86 => HeaderKind::Native(TargetArch::Bits32),
            _ => HeaderKind::Foreign,
        },
        Err(_) => HeaderKind::Unrecognized,
    }
}

/// Architecture implied by a file name, if any token is present.
pub fn guess_from_name(name: &str) -> Option<TargetArch> {
    let lower = name.to_ascii_lowercase();
    if lower.contains("arm64") || lower.contains("aarch64") {
        Some(TargetArch::Arm64)
    } else if lower.contains("64") {
        Some(TargetArch::Bits64)
    } else if lower.contains("32") || lower.contains("86") {
        Some(TargetArch::Bits32)
    } else {
        None
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use goblin::elf::header::{EM_ARM, EM_RISCV};
    use goblin::mach::cputype::CPU_TYPE_ARM;
    use goblin::pe::header::COFF_MACHINE_ARMNT;

    #[test]
    fn elf_machine() {
        assert_eq!(
            inspect_header(&elf(1, EM_386)),
            HeaderKind::Native(TargetArch::Bits32)
        );
        assert_eq!(
            inspect_header(&elf(2, EM_X86_64)),
            HeaderKind::Native(TargetArch::Bits64)
        );
        assert_eq!(
            inspect_header(&elf(2, EM_AARCH64)),
            HeaderKind::Native(TargetArch::Arm64)
        );
        assert_eq!(inspect_header(&elf(2, EM_RISCV)), HeaderKind::Foreign);
    }

    #[test]
    fn arm32_never_passes_as_x86() {
        assert_eq!(inspect_header(&elf(1, EM_ARM)), HeaderKind::Foreign);
        assert_eq!(inspect_header(&pe(COFF_MACHINE_ARMNT)), HeaderKind::Foreign);
        assert_eq!(inspect_header(&macho(CPU_TYPE_ARM)), HeaderKind::Foreign);
    }

    #[test]
    fn pe_machine_field() {
        assert_eq!(
            inspect_header(&pe(COFF_MACHINE_X86)),
            HeaderKind::Native(TargetArch::Bits32)
        );
        assert_eq!(
            inspect_header(&pe(COFF_MACHINE_X86_64)),
            HeaderKind::Native(TargetArch::Bits64)
        );
        assert_eq!(
            inspect_header(&pe(COFF_MACHINE_ARM64)),
            HeaderKind::Native(TargetArch::Arm64)
        );
    }

    #[test]
    fn truncated_pe_is_unrecognized() {
        let mut bytes = pe(COFF_MACHINE_X86_64);
        bytes.truncate(0x82);
        assert_eq!(inspect_header(&bytes), HeaderKind::Unrecognized);
    }

    #[test]
    fn macho_thin_and_fat() {
        assert_eq!(
            inspect_header(&macho(CPU_TYPE_ARM64)),
            HeaderKind::Native(TargetArch::Arm64)
        );
        assert_eq!(
            inspect_header(&macho(CPU_TYPE_X86_64)),
            HeaderKind::Native(TargetArch::Bits64)
        );

        let mut fat = 0xCAFE_BABEu32.to_be_bytes().to_vec();
        fat.extend_from_slice(&2u32.to_be_bytes());
        fat.resize(64, 0);
        assert_eq!(inspect_header(&fat), HeaderKind::Universal);
    }

    #[test]
    fn class_file_is_not_fat_macho() {
        assert_eq!(inspect_header(&class_file()), HeaderKind::JavaClass);
    }

    #[test]
    fn text_is_unrecognized() {
        assert_eq!(
            inspect_header(b"plain text, long enough to peek"),
            HeaderKind::Unrecognized
        );
        assert_eq!(inspect_header(b""), HeaderKind::Unrecognized);
    }

    #[test]
    fn name_tokens() {
        assert_eq!(guess_from_name("lwjgl64.dll"), Some(TargetArch::Bits64));
        assert_eq!(guess_from_name("lib-x86_64.so"), Some(TargetArch::Bits64));
        assert_eq!(guess_from_name("lib-x86.so"), Some(TargetArch::Bits32));
        assert_eq!(
            guess_from_name("liblwjgl-aarch64.so"),
            Some(TargetArch::Arm64)
        );
        assert_eq!(guess_from_name("liblwjgl.dylib"), None);
    }
}
