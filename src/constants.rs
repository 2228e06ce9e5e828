//! Shared names and default values
//!
//! Centralized location for reserved prefixes, built-in parameter names and
//! document tokens.

/// Prefix marking a parameter that is also a data input port
pub const INPUT_PREFIX: &str = "inputs:";

/// Prefix marking a parameter that is also a data output port
pub const OUTPUT_PREFIX: &str = "outputs:";

/// Prefix of positional argument parameters
pub const ARG_PREFIX: &str = "inputs:arg";

/// Built-in parameter names shared by every node
pub mod param {
    pub const NAME: &str = "name";
    pub const LABEL: &str = "label";
    pub const LABEL_FONT_SIZE: &str = "labelFontSize";
    pub const X: &str = "x";
    pub const Y: &str = "y";
    pub const LOCKED: &str = "locked";
    pub const DISABLE: &str = "disable";
    pub const FILL_COLOR: &str = "fillColor";
    pub const BORDER_COLOR: &str = "borderColor";
    pub const WIDTH: &str = "width";
    pub const HEIGHT: &str = "height";
}

/// Hint keys understood by editors
pub mod hint {
    pub const WIDGET: &str = "widget";
    pub const TAB: &str = "tab";
    pub const SHOW_EDITOR: &str = "showEditor";
    pub const OPTIONS: &str = "options";
}

/// Flow port names used by built-in node types
pub mod port {
    pub const IN: &str = "In";
    pub const OUT: &str = "Out";
    pub const FINALLY: &str = "Finally";
    /// Pass-through input
    pub const DOT_INPUT: &str = "input";
    /// Pass-through output
    pub const DOT_OUTPUT: &str = "output";
}

/// Graph document tokens
pub mod document {
    pub const ROOT: &str = "nodegraph";
    pub const NODE: &str = "n";
    pub const PARAM: &str = "p";
    pub const OUTPUT: &str = "o";
    pub const INPUT: &str = "i";
    pub const METADATA: &str = "m";
    pub const HINT: &str = "h";
    /// Replacement for newlines inside the label value
    pub const NEWLINE_TOKEN: &str = "<\\n>";
}

/// Node system defaults
pub mod node {
    /// Group assigned to types that do not declare one
    pub const DEFAULT_GROUP: &str = "Other";
    /// Type that execution starts from
    pub const ENTRY_TYPE: &str = "Main";
    pub const DEFAULT_FILL_COLOR: [u8; 3] = [50, 60, 70];
    pub const DEFAULT_BORDER_COLOR: [u8; 3] = [50, 60, 70];
    pub const DEFAULT_LABEL_FONT_SIZE: i64 = 10;
    pub const DEFAULT_WIDTH: f32 = 150.0;
    pub const DEFAULT_HEIGHT: f32 = 30.0;
}

/// Engine defaults
pub mod engine {
    /// Nesting limit for execute and upstream resolution calls
    pub const DEFAULT_MAX_DEPTH: usize = 256;
}
