//! Decompiler: re-parses an executable image into an annotated
//! assembly-like listing using the shared opcode table.

use std::fmt;

use crate::opcodes::{
    abs_target, op_data, rel_target, Op, OpParams, COMMAND_NAME_SIZE, CONST_OFFSET, MAGIC,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecompileErrorKind {
    InvalidSignature,
    InvalidOp,
    PrematureEof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecompileError {
    pub kind: DecompileErrorKind,
    pub addr: usize,
}

impl fmt::Display for DecompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self.kind {
            DecompileErrorKind::InvalidSignature => "invalid signature",
            DecompileErrorKind::InvalidOp => "invalid op",
            DecompileErrorKind::PrematureEof => "premature EOF",
        };
        write!(f, "{} at {:#06x}", msg, self.addr)
    }
}

impl std::error::Error for DecompileError {}

type DResult<T> = Result<T, DecompileError>;

pub fn decompile(image: &[u8]) -> Result<String, DecompileError> {
    Decompiler::new(image).run()
}

struct Decompiler<'a> {
    image: &'a [u8],
    pos: usize,
    out: String,
}

impl<'a> Decompiler<'a> {
    fn new(image: &'a [u8]) -> Self {
        Self { image, pos: 0, out: String::new() }
    }

    fn err<T>(&self, kind: DecompileErrorKind) -> DResult<T> {
        Err(DecompileError { kind, addr: self.pos })
    }

    fn u8(&mut self) -> DResult<u8> {
        match self.image.get(self.pos) {
            Some(&b) => {
                self.pos += 1;
                Ok(b)
            }
            None => self.err(DecompileErrorKind::PrematureEof),
        }
    }

    fn u16(&mut self) -> DResult<u16> {
        let lo = self.u8()?;
        let hi = self.u8()?;
        Ok(u16::from_le_bytes([lo, hi]))
    }

    fn u32(&mut self) -> DResult<u32> {
        let lo = self.u16()?;
        let hi = self.u16()?;
        Ok((hi as u32) << 16 | lo as u32)
    }

    fn run(mut self) -> DResult<String> {
        if self.image.len() < CONST_OFFSET as usize || self.image[0..4] != MAGIC {
            return self.err(DecompileErrorKind::InvalidSignature);
        }
        self.pos = 4;

        let const_words = self.u16()?;
        let global_size = self.u16()?;
        let stack_size = self.u16()?;
        let _reserved = self.u16()?;

        self.out.push_str(&format!(
            "globals {} words, stack {} words\n\n",
            global_size, stack_size
        ));

        self.constants(const_words)?;
        let commands = self.commands()?;
        self.code()?;

        for (name, params, init, lp) in commands {
            self.out.push_str(&format!(
                "command '{}' params {} init {} loop {}\n",
                name, params, init, lp
            ));
        }
        Ok(self.out)
    }

    fn constants(&mut self, count: u16) -> DResult<()> {
        self.out.push_str("const\n");
        for i in 0..count {
            let w = self.u32()?;
            self.out.push_str(&format!("    [{}] = {}\n", i, w));
        }
        self.out.push('\n');
        Ok(())
    }

    fn commands(&mut self) -> DResult<Vec<(String, u8, u16, u16)>> {
        let mut out = Vec::new();
        loop {
            if self.u8()? == 0 {
                return Ok(out);
            }
            self.pos -= 1;

            let mut name = String::new();
            for _ in 0..COMMAND_NAME_SIZE {
                let b = self.u8()?;
                if b != 0 {
                    name.push(b as char);
                }
            }
            let params = self.u8()?;
            let init = self.u16()?;
            let lp = self.u16()?;
            out.push((name, params, init, lp));
        }
    }

    fn code(&mut self) -> DResult<()> {
        self.out.push_str("code\n");
        let code_start = self.pos;
        while self.pos < self.image.len() {
            self.statement(code_start)?;
        }
        self.out.push('\n');
        Ok(())
    }

    fn statement(&mut self, code_start: usize) -> DResult<()> {
        let addr = self.pos - code_start;
        let byte = self.u8()?;
        let (_, index) = Op::decode(byte);
        let op = match Op::from_byte(byte) {
            Some(op) => op,
            None => {
                self.pos -= 1;
                return self.err(DecompileErrorKind::InvalidOp);
            }
        };
        let data = match op_data(op) {
            Some(d) => d,
            None => return self.err(DecompileErrorKind::InvalidOp),
        };

        self.out.push_str(&format!("    [{:4}] {}", addr, data.name));

        match data.params {
            OpParams::None => {}
            OpParams::Id => {
                let id = self.u8()?;
                self.out.push_str(&format!(" [{}]", id));
            }
            OpParams::Const => {
                let c = self.u8()?;
                self.out.push_str(&format!(" {}", c));
            }
            OpParams::RelTarg => {
                let low = self.u8()?;
                let off = rel_target(index, low);
                let target = addr as i32 + 2 + off as i32;
                self.out.push_str(&format!(" {} -> [{}]", off, target));
            }
            OpParams::AbsTarg => {
                let low = self.u8()?;
                let targ = abs_target(index, low);
                self.out.push_str(&format!(" [{}]", targ));
            }
            OpParams::PL => {
                let locals = self.u8()?;
                self.out.push_str(&format!(" {} {}", index, locals));
            }
            OpParams::Index => {
                self.out.push_str(&format!(" {}", index));
            }
            OpParams::IdxLenS => {
                let len = self.u8()?;
                self.out.push_str(&format!(" {} \"", index));
                for _ in 0..len {
                    let c = self.u8()?;
                    if c >= 0x20 && c < 0x7f {
                        self.out.push(c as char);
                    } else if c == b'\n' {
                        self.out.push_str("\\n");
                    } else {
                        self.out.push_str(&format!("\\x{:02x}", c));
                    }
                }
                self.out.push('"');
            }
        }
        self.out.push('\n');
        Ok(())
    }
}
