#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
}

/// Commands whose whole remainder is one free-text argument.
pub(crate) const TEXT_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "generate",
        action: "generate",
    },
    CommandSpec {
        command: "edit",
        action: "edit",
    },
];

pub(crate) const SINGLE_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "open",
        action: "open_design",
    },
    CommandSpec {
        command: "brand_remove",
        action: "remove_brand",
    },
];

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "new",
        action: "new_design",
    },
    CommandSpec {
        command: "workspace",
        action: "show_workspace",
    },
    CommandSpec {
        command: "ideation",
        action: "show_ideation",
    },
    CommandSpec {
        command: "production",
        action: "show_production",
    },
    CommandSpec {
        command: "trends",
        action: "show_trends",
    },
    CommandSpec {
        command: "techpack",
        action: "tech_pack",
    },
    CommandSpec {
        command: "show",
        action: "show",
    },
    CommandSpec {
        command: "designs",
        action: "list_designs",
    },
    CommandSpec {
        command: "brand",
        action: "list_brand",
    },
    CommandSpec {
        command: "brand_clear",
        action: "clear_brand",
    },
    CommandSpec {
        command: "wait",
        action: "wait",
    },
    CommandSpec {
        command: "help",
        action: "help",
    },
    CommandSpec {
        command: "quit",
        action: "quit",
    },
    CommandSpec {
        command: "exit",
        action: "quit",
    },
];

pub(crate) const BRAND_ADD_COMMAND: CommandSpec = CommandSpec {
    command: "brand_add",
    action: "add_brand",
};

pub(crate) const EXPORT_COMMAND: CommandSpec = CommandSpec {
    command: "export",
    action: "export",
};

pub const STUDIO_HELP_COMMANDS: &[&str] = &[
    "/new",
    "/generate <prompt>",
    "/edit <instruction>",
    "/techpack",
    "/workspace",
    "/ideation",
    "/production",
    "/open <design-id>",
    "/trends",
    "/show",
    "/designs",
    "/brand",
    "/brand_add <color|logo|fit> <name> <value>",
    "/brand_remove <asset-id>",
    "/brand_clear",
    "/export [dir]",
    "/wait",
    "/help",
    "/quit",
];
