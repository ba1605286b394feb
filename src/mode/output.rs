use super::CapabilityError;

const INDENT: &str = "    ";

/// Lifecycle of an emitter over one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EmitState {
    #[default]
    Idle,
    Emitting,
    Finalized,
}

/// Bookkeeping for one open `block()`.
///
/// Dialects without native block scoping use the id to name the wrapper
/// function and the recorded locals to emit deletions on close.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockFrame {
    pub id: usize,
    pub exported_locals: Vec<String>,
    pub statements: usize,
}

/// Ordered text buffer shared by every dialect.
#[derive(Debug, Default)]
pub struct Output {
    lines: Vec<String>,
    indent: usize,
    state: EmitState,
    blocks: Vec<BlockFrame>,
    next_block_id: usize,
}

impl Output {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> EmitState {
        self.state
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Append one statement at the current indentation.
    ///
    /// Embedded newlines are kept verbatim; they may sit inside a quoted string.
    pub fn write(&mut self, line: impl AsRef<str>) -> Result<(), CapabilityError> {
        self.ensure_writable()?;
        let line = line.as_ref();
        if line.is_empty() {
            self.lines.push(String::new());
        } else {
            self.lines.push(format!("{}{}", INDENT.repeat(self.indent), line));
        }
        if let Some(frame) = self.blocks.last_mut() {
            frame.statements += 1;
        }
        Ok(())
    }

    pub fn indent(&mut self) {
        self.indent += 1;
    }

    pub fn dedent(&mut self) {
        self.indent = self.indent.saturating_sub(1);
    }

    pub fn in_block(&self) -> bool {
        !self.blocks.is_empty()
    }

    /// Id the next `open_block` call will hand out.
    pub fn next_block_id(&self) -> usize {
        self.next_block_id
    }

    /// Push a new frame and return its unique id.
    pub fn open_block(&mut self) -> Result<usize, CapabilityError> {
        self.ensure_writable()?;
        let id = self.next_block_id;
        self.next_block_id += 1;
        self.blocks.push(BlockFrame {
            id,
            exported_locals: Vec::new(),
            statements: 0,
        });
        Ok(id)
    }

    pub fn close_block(&mut self) -> Result<BlockFrame, CapabilityError> {
        self.blocks.pop().ok_or(CapabilityError::NoOpenBlock)
    }

    pub fn current_block(&self) -> Option<&BlockFrame> {
        self.blocks.last()
    }

    /// Remember an exported local so the block can clean it up.
    pub fn record_exported_local(&mut self, name: &str) -> Result<(), CapabilityError> {
        let frame = self
            .blocks
            .last_mut()
            .ok_or_else(|| CapabilityError::LocalOutsideBlock {
                name: name.to_string(),
            })?;
        if !frame.exported_locals.iter().any(|existing| existing == name) {
            frame.exported_locals.push(name.to_string());
        }
        Ok(())
    }

    /// Append trailing statements and hand back the finished text.
    pub fn finalize(&mut self, epilogue: &[String]) -> Result<Vec<String>, CapabilityError> {
        self.ensure_writable()?;
        if !self.blocks.is_empty() {
            return Err(CapabilityError::UnclosedBlocks(self.blocks.len()));
        }
        for line in epilogue {
            self.write(line)?;
        }
        self.state = EmitState::Finalized;
        Ok(std::mem::take(&mut self.lines))
    }

    fn ensure_writable(&mut self) -> Result<(), CapabilityError> {
        match self.state {
            EmitState::Finalized => Err(CapabilityError::Finalized),
            EmitState::Idle => {
                self.state = EmitState::Emitting;
                Ok(())
            }
            EmitState::Emitting => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_write_starts_emitting() {
        let mut out = Output::new();
        assert_eq!(out.state(), EmitState::Idle);
        out.write("echo hi").unwrap();
        assert_eq!(out.state(), EmitState::Emitting);
    }

    #[test]
    fn writes_are_indented() {
        let mut out = Output::new();
        out.write("begin").unwrap();
        out.indent();
        out.write("set x 1").unwrap();
        out.dedent();
        out.write("end").unwrap();
        assert_eq!(out.lines(), ["begin", "    set x 1", "end"]);
    }

    #[test]
    fn finalized_rejects_writes() {
        let mut out = Output::new();
        out.write("a").unwrap();
        let lines = out.finalize(&["cleanup".to_string()]).unwrap();
        assert_eq!(lines, ["a", "cleanup"]);
        assert_eq!(out.state(), EmitState::Finalized);
        assert!(matches!(out.write("b"), Err(CapabilityError::Finalized)));
        assert!(matches!(out.finalize(&[]), Err(CapabilityError::Finalized)));
    }

    #[test]
    fn finalize_rejects_open_blocks() {
        let mut out = Output::new();
        out.open_block().unwrap();
        assert!(matches!(
            out.finalize(&[]),
            Err(CapabilityError::UnclosedBlocks(1))
        ));
    }

    #[test]
    fn block_ids_are_unique_and_track_locals() {
        let mut out = Output::new();
        let outer = out.open_block().unwrap();
        let inner = out.open_block().unwrap();
        assert_ne!(outer, inner);
        out.record_exported_local("FOO").unwrap();
        out.record_exported_local("FOO").unwrap();
        out.write("x").unwrap();
        let frame = out.close_block().unwrap();
        assert_eq!(frame.id, inner);
        assert_eq!(frame.exported_locals, ["FOO"]);
        assert_eq!(frame.statements, 1);
        assert_eq!(out.close_block().unwrap().exported_locals, Vec::<String>::new());
        assert!(matches!(out.close_block(), Err(CapabilityError::NoOpenBlock)));
    }

    #[test]
    fn exported_local_requires_block() {
        let mut out = Output::new();
        assert!(matches!(
            out.record_exported_local("FOO"),
            Err(CapabilityError::LocalOutsideBlock { .. })
        ));
    }
}
