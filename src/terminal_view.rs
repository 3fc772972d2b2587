/*
 * A plain-text view for the command line. It drains `ViewCommand`s from the
 * presenter and renders each one to a writer (stdout in the binary, a buffer
 * in tests). It keeps the last error it was told to show so the caller can
 * turn a failed screen into a non-zero exit.
 */
use crate::app_logic::{ProfileHeader, ViewCommand, ViewEventHandler};
use crate::core::Profile;
use std::io::{self, Write};

pub struct TerminalView<W: Write> {
    out: W,
    last_error: Option<String>,
}

impl<W: Write> TerminalView<W> {
    pub fn new(out: W) -> Self {
        TerminalView {
            out,
            last_error: None,
        }
    }

    // Executes every command the presenter has queued, in order.
    pub fn drain(&mut self, presenter: &mut dyn ViewEventHandler) -> io::Result<()> {
        while let Some(command) = presenter.try_dequeue_command() {
            self.execute(command)?;
        }
        Ok(())
    }

    pub fn execute(&mut self, command: ViewCommand) -> io::Result<()> {
        log::trace!("TerminalView: Executing {command:?}");
        match command {
            ViewCommand::SetLoading { visible } => {
                if visible {
                    writeln!(self.out, "Loading...")?;
                }
            }
            ViewCommand::DisplayProfile { header } => self.write_header(&header)?,
            ViewCommand::ReloadTable { rows } => {
                for row in rows {
                    writeln!(self.out, "  > {row}")?;
                }
            }
            ViewCommand::UpdateNftLists {
                my_nfts,
                favourite_nfts,
            } => {
                writeln!(self.out, "My NFTs: {}", join_or_none(&my_nfts))?;
                writeln!(self.out, "Favourites: {}", join_or_none(&favourite_nfts))?;
            }
            ViewCommand::ShowError { message, retryable } => {
                if retryable {
                    writeln!(self.out, "Error: {message} (run the command again to retry)")?;
                } else {
                    writeln!(self.out, "Error: {message}")?;
                }
                self.last_error = Some(message);
            }
        }
        Ok(())
    }

    // Prints a profile that did not come through the presenter, e.g. the cached copy.
    pub fn print_profile(&mut self, profile: &Profile) -> io::Result<()> {
        writeln!(self.out, "Profile {}", profile.id)?;
        self.write_header(&ProfileHeader::from(profile))?;
        writeln!(self.out, "My NFTs: {}", join_or_none(&profile.nfts))?;
        writeln!(self.out, "Favourites: {}", join_or_none(&profile.likes))
    }

    pub fn print_line(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.out, "{line}")
    }

    pub fn take_error(&mut self) -> Option<String> {
        self.last_error.take()
    }

    fn write_header(&mut self, header: &ProfileHeader) -> io::Result<()> {
        writeln!(self.out, "{}", header.name)?;
        if !header.description.is_empty() {
            writeln!(self.out, "{}", header.description)?;
        }
        if !header.website.is_empty() {
            writeln!(self.out, "Website: {}", header.website)?;
        }
        if !header.avatar.is_empty() {
            writeln!(self.out, "Avatar: {}", header.avatar)?;
        }
        Ok(())
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

fn join_or_none(ids: &[String]) -> String {
    if ids.is_empty() {
        "(none)".to_string()
    } else {
        ids.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(commands: Vec<ViewCommand>) -> (String, Option<String>) {
        let mut view = TerminalView::new(Vec::new());
        for command in commands {
            view.execute(command).unwrap();
        }
        let error = view.take_error();
        (String::from_utf8(view.into_inner()).unwrap(), error)
    }

    #[test]
    fn test_profile_and_rows_are_rendered() {
        let header = ProfileHeader {
            name: "Alice".to_string(),
            avatar: String::new(),
            description: "NFT enthusiast".to_string(),
            website: "https://alice.example".to_string(),
        };
        let (output, error) = render(vec![
            ViewCommand::DisplayProfile { header },
            ViewCommand::ReloadTable {
                rows: vec!["My NFTs (2)".to_string()],
            },
            ViewCommand::UpdateNftLists {
                my_nfts: vec!["n1".to_string(), "n2".to_string()],
                favourite_nfts: Vec::new(),
            },
        ]);

        assert_eq!(
            output,
            "Alice\nNFT enthusiast\nWebsite: https://alice.example\n  > My NFTs (2)\nMy NFTs: n1, n2\nFavourites: (none)\n"
        );
        assert_eq!(error, None);
    }

    #[test]
    fn test_error_is_rendered_and_remembered() {
        let (output, error) = render(vec![ViewCommand::ShowError {
            message: "boom".to_string(),
            retryable: true,
        }]);

        assert!(output.starts_with("Error: boom"));
        assert!(output.contains("retry"));
        assert_eq!(error.as_deref(), Some("boom"));
    }
}
