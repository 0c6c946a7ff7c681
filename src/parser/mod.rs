//! Readiness/failure classification of server output.
//!
//! The server has no structured status channel, so lifecycle transitions are
//! inferred from well-known log lines. Every marker lives in this module.

use std::sync::LazyLock;

use regex::Regex;

use crate::config::LoaderType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Ready,
    Failed,
    Unclassified,
}

pub const FAILURE_MARKER: &str = "Failed to start the Minecraft server";
pub const HELP_BANNER: &str = "For help, type \"help\"";
pub const WORLD_SAVED_MARKER: &str = "All dimensions are saved";

static DONE_BANNER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Done \([0-9.]+s\)!").unwrap());

const VANILLA_READY: &[&str] = &[WORLD_SAVED_MARKER, HELP_BANNER];
const MODDED_READY: &[&str] = &[HELP_BANNER];

/// Literal readiness markers for a loader. The timed `Done (…s)!` banner
/// applies to every loader on top of these.
pub fn ready_markers(loader: LoaderType) -> &'static [&'static str] {
    match loader {
        LoaderType::Vanilla => VANILLA_READY,
        LoaderType::Fabric | LoaderType::Forge => MODDED_READY,
    }
}

/// Classifies one raw output line. Matching is case-sensitive and runs on the
/// unstripped line; a failure marker wins over any readiness marker.
pub fn classify(line: &str, loader: LoaderType) -> Classification {
    if line.contains(FAILURE_MARKER) {
        return Classification::Failed;
    }

    if DONE_BANNER.is_match(line) || ready_markers(loader).iter().any(|m| line.contains(m)) {
        return Classification::Ready;
    }

    Classification::Unclassified
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [LoaderType; 3] = [LoaderType::Vanilla, LoaderType::Fabric, LoaderType::Forge];

    #[test]
    fn done_banner_is_ready_for_every_loader() {
        let line = r#"[12:00:05] [Server thread/INFO]: Done (5.213s)! For help, type "help""#;
        for loader in ALL {
            assert_eq!(classify(line, loader), Classification::Ready, "{loader}");
        }
    }

    #[test]
    fn timed_banner_alone_is_ready() {
        let line = "[12:00:05] [Server thread/INFO]: Done (12.5s)!";
        for loader in ALL {
            assert_eq!(classify(line, loader), Classification::Ready);
        }
    }

    #[test]
    fn help_banner_alone_is_ready() {
        let line = r#"[Server thread/INFO]: For help, type "help""#;
        for loader in ALL {
            assert_eq!(classify(line, loader), Classification::Ready);
        }
    }

    #[test]
    fn world_save_marker_is_vanilla_only() {
        let line = "[12:00:09] [Server thread/INFO]: ThreadedAnvilChunkStorage: All dimensions are saved";
        assert_eq!(classify(line, LoaderType::Vanilla), Classification::Ready);
        assert_eq!(classify(line, LoaderType::Fabric), Classification::Unclassified);
        assert_eq!(classify(line, LoaderType::Forge), Classification::Unclassified);
    }

    #[test]
    fn failure_marker() {
        let line = "[12:00:01] [Server thread/ERROR]: Failed to start the Minecraft server";
        for loader in ALL {
            assert_eq!(classify(line, loader), Classification::Failed);
        }
    }

    #[test]
    fn failure_wins_over_readiness() {
        let line = r#"Failed to start the Minecraft server; Done (1.0s)! For help, type "help""#;
        assert_eq!(classify(line, LoaderType::Vanilla), Classification::Failed);
    }

    #[test]
    fn ordinary_lines_are_unclassified() {
        for line in [
            "[12:00:00] [Server thread/INFO]: Starting minecraft server version 1.20.4",
            "[12:00:02] [Worker-Main-1/INFO]: Preparing spawn area: 42%",
            "Done",
            "done (5.2s)! for help, type \"help\"",
            "",
        ] {
            for loader in ALL {
                assert_eq!(classify(line, loader), Classification::Unclassified, "{line}");
            }
        }
    }

    #[test]
    fn markers_survive_color_codes_around_them() {
        let line = "\u{1b}[32m[12:00:05] [Server thread/INFO]: Done (3.1s)! For help, type \"help\"\u{1b}[0m";
        assert_eq!(classify(line, LoaderType::Fabric), Classification::Ready);
    }
}
