use simnet_types::principal::ProgramId;

use crate::error::VmError;

/// Maximum nesting of program calls, the top-level call included.
pub const MAX_CALL_DEPTH: usize = 8;

/// Maximum nesting of user function applications. Bounds both the longest
/// call chain inside one program (checked when compiling) and the whole
/// nesting of a call across programs (checked while running).
pub const MAX_FUNCTION_DEPTH: usize = 32;

/// Tracks the nested cross-program call chain and the function nesting
/// inside it.
///
/// Enforces maximum call depth and prevents re-entrancy (a program
/// cannot call itself, directly or transitively).
#[derive(Debug, Clone, Default)]
pub struct CallStack {
    programs: Vec<ProgramId>,
    functions: usize,
}

impl CallStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter `program`.
    ///
    /// Fails if the maximum depth would be exceeded or if the program is
    /// already on the stack.
    pub fn push(&mut self, program: ProgramId) -> Result<(), VmError> {
        let new_depth = self.programs.len() + 1;
        if new_depth > MAX_CALL_DEPTH {
            return Err(VmError::abort(format!(
                "call depth exceeded: {new_depth} > {MAX_CALL_DEPTH}"
            )));
        }
        if self.is_reentrant(&program) {
            return Err(VmError::abort(format!(
                "re-entrancy detected: {program} is already on the call stack"
            )));
        }
        self.programs.push(program);
        Ok(())
    }

    pub fn pop(&mut self) -> Option<ProgramId> {
        self.programs.pop()
    }

    pub fn depth(&self) -> usize {
        self.programs.len()
    }

    /// Whether a program is already on the call stack.
    pub fn is_reentrant(&self, program: &ProgramId) -> bool {
        self.programs.contains(program)
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    /// Enter a user function body. Pair with [`CallStack::exit_function`].
    pub fn enter_function(&mut self) -> Result<(), VmError> {
        if self.functions >= MAX_FUNCTION_DEPTH {
            return Err(VmError::abort(format!(
                "function nesting exceeded: more than {MAX_FUNCTION_DEPTH} levels"
            )));
        }
        self.functions += 1;
        Ok(())
    }

    pub fn exit_function(&mut self) {
        self.functions = self.functions.saturating_sub(1);
    }

    pub fn function_depth(&self) -> usize {
        self.functions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simnet_types::primitives::Address;

    fn program(i: u8) -> ProgramId {
        ProgramId::new(Address::new([1u8; 20]), format!("p{i}"))
    }

    #[test]
    fn test_push_and_pop() {
        let mut stack = CallStack::new();
        assert!(stack.is_empty());
        stack.push(program(0)).unwrap();
        assert_eq!(stack.depth(), 1);
        assert_eq!(stack.pop(), Some(program(0)));
        assert!(stack.is_empty());
        assert!(stack.pop().is_none());
    }

    #[test]
    fn test_depth_limit() {
        let mut stack = CallStack::new();
        for i in 0..MAX_CALL_DEPTH as u8 {
            stack.push(program(i)).unwrap();
        }
        let err = stack.push(program(99)).unwrap_err();
        assert!(err.to_string().contains("call depth exceeded"));
        assert_eq!(stack.depth(), MAX_CALL_DEPTH);
    }

    #[test]
    fn test_reentrancy_detection() {
        let mut stack = CallStack::new();
        stack.push(program(1)).unwrap();
        stack.push(program(2)).unwrap();
        assert!(stack.is_reentrant(&program(1)));
        let err = stack.push(program(1)).unwrap_err();
        assert!(err.to_string().contains("re-entrancy"));
        assert_eq!(stack.depth(), 2);
    }

    #[test]
    fn test_function_nesting_limit() {
        let mut stack = CallStack::new();
        for _ in 0..MAX_FUNCTION_DEPTH {
            stack.enter_function().unwrap();
        }
        let err = stack.enter_function().unwrap_err();
        assert!(err.to_string().contains("function nesting exceeded"));
        stack.exit_function();
        assert_eq!(stack.function_depth(), MAX_FUNCTION_DEPTH - 1);
        stack.enter_function().unwrap();
    }
}
