use tinytrace_core::{Environment, Observation, StepVisitor, ToValue};

/// The flat environment a traced function reports through.
///
/// A traced function binds its variables into the frame and calls
/// [`Frame::line`] after every statement, usually through [`observe!`].
/// Each call hands the visitor an observation holding a copy of the
/// environment, so later mutation of the function's variables never leaks
/// into an earlier observation.
///
/// Recursive calls share the caller's frame: nested scopes are collapsed
/// into one flat environment.
///
/// [`observe!`]: crate::observe
pub struct Frame<'a> {
    env: Environment,
    visitor: &'a mut dyn StepVisitor,
}

impl<'a> Frame<'a> {
    pub fn new(visitor: &'a mut dyn StepVisitor) -> Self {
        Self {
            env: Environment::new(),
            visitor,
        }
    }

    /// Bind `name` to the current value of `value`.
    ///
    /// A new name is appended to the environment; an existing one keeps its
    /// declaration position.
    pub fn bind<T: ToValue + ?Sized>(&mut self, name: &str, value: &T) {
        let value = value.to_value();
        match self.env.get_mut(name) {
            Some(slot) => *slot = value,
            None => {
                self.env.insert(name.to_string(), value);
            }
        }
    }

    /// Drop `name` from the environment, as when a variable goes out of
    /// scope. The analysis never reports deletions.
    pub fn unbind(&mut self, name: &str) {
        self.env.shift_remove(name);
    }

    /// Report that `line` has just executed.
    pub fn line(&mut self, line: u32) {
        self.visitor.visit(Observation::new(line, self.env.clone()));
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }
}

impl std::fmt::Debug for Frame<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("env", &self.env)
            .field("visitor", &"<visitor>")
            .finish()
    }
}

/// Report the line this macro is invoked on, after binding the listed
/// variables by name.
///
/// ```ignore
/// let mut total = 0; observe!(frame; total);
/// for i in 0..3 { total += i; observe!(frame; i, total); }
/// ```
#[macro_export]
macro_rules! observe {
    ($frame:expr $(; $($name:ident),* $(,)?)?) => {{
        let frame: &mut $crate::Frame<'_> = &mut *$frame;
        $($(frame.bind(::core::stringify!($name), &$name);)*)?
        frame.line(::core::line!());
    }};
}
