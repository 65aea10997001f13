//! Virtual command implementations and the registry constructor that wires
//! up the required built-in set.

pub mod cd;
pub mod echo;
pub mod env_cmd;
pub mod exit_cmd;
pub mod fs_cmds;
pub mod pwd;
pub mod seq;
pub mod sleep;
pub mod tee;
pub mod text_cmds;
pub mod write_multiline;
pub mod yes;

use std::sync::Arc;

use crate::registry::{Handler, VirtualCommandRegistry};

/// Build a registry preloaded with the required built-in set:
/// navigation/introspection, file/text, timing, and the compat helper.
/// Callers may `register`/`unregister`/`enable`/`disable` further.
pub fn with_builtins() -> VirtualCommandRegistry {
    let mut registry = VirtualCommandRegistry::new();

    registry.register(Handler::Buffered(Arc::new(cd::CdCommand)));
    registry.register(Handler::Buffered(Arc::new(pwd::PwdCommand)));
    registry.register(Handler::Buffered(Arc::new(env_cmd::WhichCommand)));
    registry.register(Handler::Buffered(Arc::new(env_cmd::EnvCommand)));
    registry.register(Handler::Buffered(Arc::new(exit_cmd::ExitCommand)));

    registry.register(Handler::Buffered(Arc::new(fs_cmds::CatCommand)));
    registry.register(Handler::Buffered(Arc::new(echo::EchoCommand)));
    registry.register(Handler::Buffered(Arc::new(fs_cmds::LsCommand)));
    registry.register(Handler::Buffered(Arc::new(fs_cmds::MkdirCommand)));
    registry.register(Handler::Buffered(Arc::new(fs_cmds::CpCommand)));
    registry.register(Handler::Buffered(Arc::new(fs_cmds::MvCommand)));
    registry.register(Handler::Buffered(Arc::new(fs_cmds::RmCommand)));
    registry.register(Handler::Buffered(Arc::new(fs_cmds::TouchCommand)));
    registry.register(Handler::Buffered(Arc::new(fs_cmds::HeadCommand)));
    registry.register(Handler::Buffered(Arc::new(fs_cmds::TailCommand)));
    registry.register(Handler::Buffered(Arc::new(seq::SeqCommand)));
    registry.register(Handler::Buffered(Arc::new(text_cmds::SortCommand)));
    registry.register(Handler::Buffered(Arc::new(text_cmds::UniqCommand)));
    registry.register(Handler::Buffered(Arc::new(text_cmds::WcCommand)));
    registry.register(Handler::Buffered(Arc::new(text_cmds::GrepCommand)));
    registry.register(Handler::Buffered(Arc::new(tee::TeeCommand)));
    registry.register(Handler::Buffered(Arc::new(write_multiline::WriteMultilineCommand)));

    registry.register(Handler::Streaming(Arc::new(sleep::SleepCommand)));
    registry.register(Handler::Streaming(Arc::new(yes::YesCommand)));

    registry
}
