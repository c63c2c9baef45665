use std::io::{self, Stdout};

use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{error, warn};

use crate::app::App;
use crate::error::Result;
use crate::ui;

/// Owns the terminal for the lifetime of the explorer: raw mode, the
/// alternate screen and, when enabled, mouse capture for clicks and the
/// wheel. Dropping it puts the terminal back even when the run loop bailed
/// out with an error.
pub struct Tui {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    mouse: bool,
    active: bool,
}

impl Tui {
    pub fn new(mouse: bool) -> Result<Self> {
        let mut stdout = io::stdout();
        terminal::enable_raw_mode()?;
        execute!(stdout, EnterAlternateScreen)?;
        if mouse {
            execute!(stdout, EnableMouseCapture)?;
        }
        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        Ok(Self {
            terminal,
            mouse,
            active: true,
        })
    }

    /// Draw one frame of the explorer.
    pub fn draw(&mut self, app: &mut App) -> Result<()> {
        self.terminal.draw(|frame| ui::render(app, frame))?;
        Ok(())
    }

    /// Leave the alternate screen. Safe to call more than once.
    pub fn restore(&mut self) -> Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        leave_screen(self.terminal.backend_mut(), self.mouse)?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

impl Drop for Tui {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            warn!(error = %e, "terminal not restored");
        }
    }
}

fn leave_screen<W: io::Write>(out: &mut W, mouse: bool) -> io::Result<()> {
    if mouse {
        execute!(out, DisableMouseCapture)?;
    }
    terminal::disable_raw_mode()?;
    execute!(out, LeaveAlternateScreen)
}

/// Restore the terminal before the default hook prints the panic. The panic
/// also goes to the log file, since the screen it was raised on is gone.
pub fn install_panic_hook(mouse: bool) {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = leave_screen(&mut io::stdout(), mouse);
        error!(panic = %panic_info, "explorer panicked");
        original_hook(panic_info);
    }));
}
