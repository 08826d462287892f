use crate::DebuggerError;

/// What the debugger needs from the host editor.
///
/// On every stop event the debugger calls [`Editor::open_file`] and then
/// [`Editor::goto_line`]. Skipping a reopen of the file already on screen is the
/// implementor's job.
pub trait Editor {
    /// Show `path` (already relative to the configured base path).
    fn open_file(&mut self, path: &str);

    /// Move the cursor to the 1-based `line`.
    fn goto_line(&mut self, line: u32);

    /// Status-bar style informational text.
    fn message(&mut self, text: &str);

    fn error(&mut self, err: &DebuggerError);
}

impl<E: Editor + ?Sized> Editor for &mut E {
    fn open_file(&mut self, path: &str) {
        (**self).open_file(path)
    }

    fn goto_line(&mut self, line: u32) {
        (**self).goto_line(line)
    }

    fn message(&mut self, text: &str) {
        (**self).message(text)
    }

    fn error(&mut self, err: &DebuggerError) {
        (**self).error(err)
    }
}

impl<E: Editor + ?Sized> Editor for Box<E> {
    fn open_file(&mut self, path: &str) {
        (**self).open_file(path)
    }

    fn goto_line(&mut self, line: u32) {
        (**self).goto_line(line)
    }

    fn message(&mut self, text: &str) {
        (**self).message(text)
    }

    fn error(&mut self, err: &DebuggerError) {
        (**self).error(err)
    }
}
