//! The remap engine interface.
//!
//! An engine renames every compiled unit of a batch of archives against a
//! shared classpath. The calling sequence is:
//!
//! 1. `read_classpath` once
//! 2. `create_input_tag` + `read_inputs` per archive
//! 3. `apply` per tag, with a per-archive [`ClassDecorator`]
//! 4. `finish` exactly once, which [`EngineGuard`] guarantees

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};

use rehost_classfile::ClassDecorator;
use rehost_mapping::TranslationTable;

use crate::error::RemapResult;

/// Identifies the inputs of one archive within a batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InputTag(u32);

impl InputTag {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn id(self) -> u32 {
        self.0
    }
}

impl fmt::Display for InputTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "input #{}", self.0)
    }
}

/// Receives the entries an engine produces.
pub trait OutputSink {
    fn accept(&mut self, name: &str, data: &[u8]) -> RemapResult<()>;
}

/// A batch renaming engine.
pub trait RemapEngine {
    /// Read reference archives used to resolve inherited members.
    fn read_classpath(&mut self, archives: &[PathBuf]) -> RemapResult<()>;

    fn create_input_tag(&mut self) -> InputTag;

    /// Read the compiled units of one archive under `tag`.
    fn read_inputs(&mut self, tag: InputTag, archive: &Path) -> RemapResult<()>;

    /// Rename every unit read under `tag`, run `transform` over each
    /// renamed unit and hand the results to `output`.
    fn apply(
        &mut self,
        tag: InputTag,
        output: &mut dyn OutputSink,
        transform: &mut dyn ClassDecorator,
    ) -> RemapResult<()>;

    /// Release everything the engine holds.
    fn finish(&mut self);

    /// The table the engine renames with, for callers that translate
    /// other artifacts the same way.
    fn translation_table(&self) -> Option<&TranslationTable> {
        None
    }
}

/// Scoped engine handle that calls [`RemapEngine::finish`] exactly once,
/// either explicitly or when dropped.
pub struct EngineGuard<'e, E: RemapEngine + ?Sized> {
    engine: &'e mut E,
    finished: bool,
}

impl<'e, E: RemapEngine + ?Sized> EngineGuard<'e, E> {
    pub fn new(engine: &'e mut E) -> Self {
        Self {
            engine,
            finished: false,
        }
    }

    pub fn finish(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.finished {
            self.finished = true;
            self.engine.finish();
        }
    }
}

impl<E: RemapEngine + ?Sized> Deref for EngineGuard<'_, E> {
    type Target = E;

    fn deref(&self) -> &E {
        self.engine
    }
}

impl<E: RemapEngine + ?Sized> DerefMut for EngineGuard<'_, E> {
    fn deref_mut(&mut self) -> &mut E {
        self.engine
    }
}

impl<E: RemapEngine + ?Sized> Drop for EngineGuard<'_, E> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CountingEngine {
        finished: usize,
        next: u32,
    }

    impl RemapEngine for CountingEngine {
        fn read_classpath(&mut self, _archives: &[PathBuf]) -> RemapResult<()> {
            Ok(())
        }

        fn create_input_tag(&mut self) -> InputTag {
            self.next += 1;
            InputTag::new(self.next)
        }

        fn read_inputs(&mut self, _tag: InputTag, _archive: &Path) -> RemapResult<()> {
            Ok(())
        }

        fn apply(
            &mut self,
            tag: InputTag,
            _output: &mut dyn OutputSink,
            _transform: &mut dyn ClassDecorator,
        ) -> RemapResult<()> {
            Err(crate::error::RemapError::UnknownTag(tag))
        }

        fn finish(&mut self) {
            self.finished += 1;
        }
    }

    #[test]
    fn explicit_finish_is_not_repeated_on_drop() {
        let mut engine = CountingEngine::default();
        let guard = EngineGuard::new(&mut engine);
        guard.finish();
        assert_eq!(engine.finished, 1);
    }

    #[test]
    fn drop_finishes_after_early_return() {
        fn run(engine: &mut CountingEngine) -> RemapResult<()> {
            let mut guard = EngineGuard::new(engine);
            let tag = guard.create_input_tag();
            guard.read_inputs(tag, Path::new("missing.jar"))?;
            Err(crate::error::RemapError::UnknownTag(tag))
        }
        let mut engine = CountingEngine::default();
        assert!(run(&mut engine).is_err());
        assert_eq!(engine.finished, 1);
        assert_eq!(engine.next, 1);
    }

    #[test]
    fn tags_display_their_id() {
        assert_eq!(InputTag::new(3).to_string(), "input #3");
    }
}
