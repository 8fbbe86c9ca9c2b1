//! Program registry for discovering and running traced programs by name.
//!
//! The registry is populated at link time by the `#[program]` macro using
//! linkme's distributed slices.

use linkme::distributed_slice;
use tinytrace_core::{Error, Result, Value};

use crate::frame::Frame;

/// The signature of a program's generated entry point.
///
/// The entry converts the positional arguments, calls the program with the
/// frame, and converts its return value.
pub type ProgramEntryFn = fn(&mut Frame<'_>, &[Value]) -> Result<Value>;

/// Static metadata describing a program.
#[derive(Debug, Clone, Copy)]
pub struct ProgramMetadataStatic {
    pub name: &'static str,
    pub description: Option<&'static str>,
    /// Parameter names, excluding the frame.
    pub params: &'static [&'static str],
    /// Source file the program is defined in.
    pub source: &'static str,
}

impl ProgramMetadataStatic {
    pub const fn new(
        name: &'static str,
        description: Option<&'static str>,
        params: &'static [&'static str],
        source: &'static str,
    ) -> Self {
        Self {
            name,
            description,
            params,
            source,
        }
    }
}

/// A registration entry for a program in the global registry.
#[derive(Clone, Copy)]
pub struct ProgramRegistration {
    pub metadata: ProgramMetadataStatic,
    pub entry: ProgramEntryFn,
}

impl ProgramRegistration {
    pub const fn new(metadata: ProgramMetadataStatic, entry: ProgramEntryFn) -> Self {
        Self { metadata, entry }
    }

    pub const fn name(&self) -> &'static str {
        self.metadata.name
    }

    pub const fn arity(&self) -> usize {
        self.metadata.params.len()
    }

    /// Fails with [`Error::ArityMismatch`] unless `actual` arguments fit.
    pub fn check_arity(&self, actual: usize) -> Result<()> {
        if actual == self.arity() {
            Ok(())
        } else {
            Err(Error::ArityMismatch {
                program: self.name().to_string(),
                expected: self.arity(),
                actual,
            })
        }
    }

    /// Run the program against `frame`.
    pub fn execute(&self, frame: &mut Frame<'_>, args: &[Value]) -> Result<Value> {
        (self.entry)(frame, args)
    }
}

impl std::fmt::Debug for ProgramRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgramRegistration")
            .field("metadata", &self.metadata)
            .field("entry", &"<fn>")
            .finish()
    }
}

/// All registered programs, populated at link time by `#[program]`.
#[distributed_slice]
pub static PROGRAM_REGISTRY: [ProgramRegistration];

pub fn iter_programs() -> impl Iterator<Item = &'static ProgramRegistration> {
    PROGRAM_REGISTRY.iter()
}

/// Find a program by name.
pub fn find_program(name: &str) -> Option<&'static ProgramRegistration> {
    PROGRAM_REGISTRY.iter().find(|reg| reg.metadata.name == name)
}

/// Like [`find_program`], failing with [`Error::UnknownProgram`].
pub fn lookup_program(name: &str) -> Result<&'static ProgramRegistration> {
    find_program(name).ok_or_else(|| Error::UnknownProgram(name.to_string()))
}

pub fn program_count() -> usize {
    PROGRAM_REGISTRY.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo(_frame: &mut Frame<'_>, args: &[Value]) -> Result<Value> {
        Ok(args.first().cloned().unwrap_or(Value::None))
    }

    const ECHO: ProgramRegistration = ProgramRegistration::new(
        ProgramMetadataStatic::new("echo", None, &["value"], file!()),
        echo,
    );

    #[test]
    fn test_arity_check() {
        assert!(ECHO.check_arity(1).is_ok());
        match ECHO.check_arity(3) {
            Err(Error::ArityMismatch {
                program,
                expected,
                actual,
            }) => {
                assert_eq!(program, "echo");
                assert_eq!((expected, actual), (1, 3));
            }
            other => panic!("expected arity mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_program() {
        assert!(find_program("no_such_program").is_none());
        assert!(matches!(
            lookup_program("no_such_program"),
            Err(Error::UnknownProgram(name)) if name == "no_such_program"
        ));
    }
}
