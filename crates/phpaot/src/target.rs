//! Target triple model (component C2).
//!
//! A deliberately small model — just the three axes the back-end driver and
//! emitter actually branch on — rather than wrapping a general-purpose
//! triple crate. `darwin` is accepted as a case-insensitive alias for
//! `macos`, matching how Apple's own tooling names the OS component.

use std::{fmt, str::FromStr};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Arch {
    X86_64,
    Aarch64,
}

impl Arch {
    fn as_str(self) -> &'static str {
        match self {
            Arch::X86_64 => "x86_64",
            Arch::Aarch64 => "aarch64",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Os {
    Linux,
    Macos,
    Windows,
}

impl Os {
    fn as_str(self) -> &'static str {
        match self {
            Os::Linux => "linux",
            Os::Macos => "macos",
            Os::Windows => "windows",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Abi {
    Gnu,
    Musl,
    Msvc,
    None,
}

impl Abi {
    fn as_str(self) -> &'static str {
        match self {
            Abi::Gnu => "gnu",
            Abi::Musl => "musl",
            Abi::Msvc => "msvc",
            Abi::None => "none",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ObjectFormat {
    Elf,
    Macho,
    Coff,
}

/// A validated `arch-os-abi` triple, e.g. `x86_64-linux-gnu`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    pub arch: Arch,
    pub os: Os,
    pub abi: Abi,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("\"{0}\" is not a valid target triple (expected arch-os-abi)")]
pub struct InvalidTarget(pub String);

impl Target {
    pub fn from_string(s: &str) -> Result<Self, InvalidTarget> {
        let parts: Vec<&str> = s.split('-').collect();
        let [arch, os, abi] = parts.as_slice() else {
            return Err(InvalidTarget(s.to_string()));
        };

        let arch = match arch.to_ascii_lowercase().as_str() {
            "x86_64" => Arch::X86_64,
            "aarch64" => Arch::Aarch64,
            _ => return Err(InvalidTarget(s.to_string())),
        };

        let os = match os.to_ascii_lowercase().as_str() {
            "linux" => Os::Linux,
            "macos" | "darwin" => Os::Macos,
            "windows" => Os::Windows,
            _ => return Err(InvalidTarget(s.to_string())),
        };

        let abi = match abi.to_ascii_lowercase().as_str() {
            "gnu" => Abi::Gnu,
            "musl" => Abi::Musl,
            "msvc" => Abi::Msvc,
            "none" => Abi::None,
            _ => return Err(InvalidTarget(s.to_string())),
        };

        Ok(Target { arch, os, abi })
    }

    /// The triple describing the machine this compiler itself was built for.
    pub fn native() -> Self {
        #[cfg(target_arch = "x86_64")]
        let arch = Arch::X86_64;
        #[cfg(target_arch = "aarch64")]
        let arch = Arch::Aarch64;

        #[cfg(target_os = "linux")]
        let (os, abi) = (Os::Linux, Abi::Gnu);
        #[cfg(target_os = "macos")]
        let (os, abi) = (Os::Macos, Abi::None);
        #[cfg(target_os = "windows")]
        let (os, abi) = (Os::Windows, Abi::Msvc);

        Target { arch, os, abi }
    }

    pub fn to_triple(self) -> String {
        self.to_string()
    }

    pub fn object_format(self) -> ObjectFormat {
        match self.os {
            Os::Linux => ObjectFormat::Elf,
            Os::Macos => ObjectFormat::Macho,
            Os::Windows => ObjectFormat::Coff,
        }
    }

    pub fn object_extension(self) -> &'static str {
        match self.object_format() {
            ObjectFormat::Elf | ObjectFormat::Macho => ".o",
            ObjectFormat::Coff => ".obj",
        }
    }

    pub fn static_lib_extension(self) -> &'static str {
        match self.object_format() {
            ObjectFormat::Elf | ObjectFormat::Macho => ".a",
            ObjectFormat::Coff => ".lib",
        }
    }

    pub fn executable_extension(self) -> &'static str {
        match self.os {
            Os::Windows => ".exe",
            Os::Linux | Os::Macos => "",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}",
            self.arch.as_str(),
            self.os.as_str(),
            self.abi.as_str()
        )
    }
}

impl FromStr for Target {
    type Err = InvalidTarget;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Target::from_string(s)
    }
}

/// The eight triples this compiler is validated against, in a fixed,
/// deterministic order.
pub const SUPPORTED_TARGETS: [Target; 8] = [
    Target {
        arch: Arch::X86_64,
        os: Os::Linux,
        abi: Abi::Gnu,
    },
    Target {
        arch: Arch::X86_64,
        os: Os::Linux,
        abi: Abi::Musl,
    },
    Target {
        arch: Arch::X86_64,
        os: Os::Macos,
        abi: Abi::None,
    },
    Target {
        arch: Arch::X86_64,
        os: Os::Windows,
        abi: Abi::Msvc,
    },
    Target {
        arch: Arch::Aarch64,
        os: Os::Linux,
        abi: Abi::Gnu,
    },
    Target {
        arch: Arch::Aarch64,
        os: Os::Linux,
        abi: Abi::Musl,
    },
    Target {
        arch: Arch::Aarch64,
        os: Os::Macos,
        abi: Abi::None,
    },
    Target {
        arch: Arch::Aarch64,
        os: Os::Windows,
        abi: Abi::Msvc,
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_canonical_triples() {
        let t = Target::from_string("aarch64-macos-none").unwrap();
        assert_eq!(t.arch, Arch::Aarch64);
        assert_eq!(t.os, Os::Macos);
        assert_eq!(t.abi, Abi::None);
    }

    #[test]
    fn darwin_is_an_alias_for_macos() {
        let t = Target::from_string("x86_64-darwin-none").unwrap();
        assert_eq!(t.arch, Arch::X86_64);
        assert_eq!(t.os, Os::Macos);
        assert_eq!(t.abi, Abi::None);
    }

    #[test]
    fn rejects_garbage() {
        assert!(Target::from_string("invalid").is_err());
        assert!(Target::from_string("x86_64-linux").is_err());
        assert!(Target::from_string("x86_64-linux-gnu-extra").is_err());
    }

    #[test]
    fn supported_targets_round_trip() {
        for target in SUPPORTED_TARGETS {
            let triple = target.to_triple();
            let parsed = Target::from_string(&triple).unwrap();
            assert_eq!(parsed, target);
        }
    }

    #[test]
    fn monotonic_enabled_count_sanity() {
        // sanity check that the list really does have 8 distinct entries,
        // since the driver's `--list-targets` flag depends on it.
        let mut triples: Vec<String> = SUPPORTED_TARGETS.iter().map(|t| t.to_triple()).collect();
        triples.sort();
        triples.dedup();
        assert_eq!(triples.len(), 8);
    }
}
