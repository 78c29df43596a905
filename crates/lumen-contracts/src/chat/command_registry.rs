#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
    pub arg_key: &'static str,
}

pub(crate) const RAW_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "ratio",
        action: "set_aspect_ratio",
        arg_key: "ratio",
    },
    CommandSpec {
        command: "size",
        action: "set_image_size",
        arg_key: "size",
    },
    CommandSpec {
        command: "text_model",
        action: "set_text_model",
        arg_key: "model",
    },
    CommandSpec {
        command: "image_model",
        action: "set_image_model",
        arg_key: "model",
    },
    CommandSpec {
        command: "show",
        action: "show_payload",
        arg_key: "index",
    },
];

pub(crate) const SINGLE_PATH_COMMANDS: &[CommandSpec] = &[CommandSpec {
    command: "save",
    action: "save_image",
    arg_key: "path",
}];

pub(crate) const MULTI_PATH_COMMANDS: &[CommandSpec] = &[CommandSpec {
    command: "attach",
    action: "attach",
    arg_key: "paths",
}];

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "help",
        action: "help",
        arg_key: "",
    },
    CommandSpec {
        command: "detach",
        action: "detach",
        arg_key: "",
    },
    CommandSpec {
        command: "history",
        action: "history",
        arg_key: "",
    },
    CommandSpec {
        command: "status",
        action: "status",
        arg_key: "",
    },
    CommandSpec {
        command: "connect",
        action: "connect",
        arg_key: "",
    },
    CommandSpec {
        command: "quit",
        action: "quit",
        arg_key: "",
    },
    CommandSpec {
        command: "exit",
        action: "quit",
        arg_key: "",
    },
];

pub const CHAT_HELP_COMMANDS: &[&str] = &[
    "/ratio",
    "/size",
    "/attach",
    "/detach",
    "/history",
    "/show",
    "/save",
    "/status",
    "/text_model",
    "/image_model",
    "/connect",
    "/quit",
];
