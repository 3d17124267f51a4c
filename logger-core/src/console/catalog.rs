//! Bench console command catalog.
//!
//! The parser walks these nodes and the help command reads the same table,
//! so keywords and usage text cannot drift apart.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandTag {
    Press,
    Release,
    Click,
    Wait,
    Sensor,
    Clock,
    Card,
    Recovery,
    Status,
    Help,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChoiceTag {
    SensorFail,
    ClockLose,
    ClockKeep,
    CardInsert,
    CardEject,
}

/// Argument layout following a keyword.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueSpec {
    None,
    /// `150ms` or `2s`.
    Duration,
    /// Temperature then humidity.
    Reading,
    /// Double-quoted text.
    Quoted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: &'static str,
    pub tag: CommandTag,
    pub grammar: &'static Node,
    pub usage: &'static str,
    pub summary: &'static str,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Node {
    End,
    /// One of the keywords, or `fallback` when none matches.
    Choice {
        choices: &'static [ChoiceBranch],
        fallback: Option<ValueSpec>,
    },
    Value {
        value: ValueSpec,
        next: &'static Node,
    },
    /// Optional free identifier naming a help topic.
    Topic {
        next: &'static Node,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChoiceBranch {
    pub keyword: &'static str,
    pub tag: ChoiceTag,
    pub next: &'static Node,
}

const END: Node = Node::End;

const WAIT_GRAMMAR: Node = Node::Value {
    value: ValueSpec::Duration,
    next: &END,
};

const SENSOR_CHOICES: [ChoiceBranch; 1] = [ChoiceBranch {
    keyword: "nan",
    tag: ChoiceTag::SensorFail,
    next: &END,
}];

const SENSOR_GRAMMAR: Node = Node::Choice {
    choices: &SENSOR_CHOICES,
    fallback: Some(ValueSpec::Reading),
};

const CLOCK_CHOICES: [ChoiceBranch; 2] = [
    ChoiceBranch {
        keyword: "lose",
        tag: ChoiceTag::ClockLose,
        next: &END,
    },
    ChoiceBranch {
        keyword: "keep",
        tag: ChoiceTag::ClockKeep,
        next: &END,
    },
];

const CLOCK_GRAMMAR: Node = Node::Choice {
    choices: &CLOCK_CHOICES,
    fallback: None,
};

const CARD_CHOICES: [ChoiceBranch; 2] = [
    ChoiceBranch {
        keyword: "insert",
        tag: ChoiceTag::CardInsert,
        next: &END,
    },
    ChoiceBranch {
        keyword: "eject",
        tag: ChoiceTag::CardEject,
        next: &END,
    },
];

const CARD_GRAMMAR: Node = Node::Choice {
    choices: &CARD_CHOICES,
    fallback: None,
};

const RECOVERY_GRAMMAR: Node = Node::Value {
    value: ValueSpec::Quoted,
    next: &END,
};

const HELP_GRAMMAR: Node = Node::Topic { next: &END };

const COMMANDS: [CommandSpec; 10] = [
    CommandSpec {
        name: "press",
        tag: CommandTag::Press,
        grammar: &END,
        usage: "press",
        summary: "hold the button down",
    },
    CommandSpec {
        name: "release",
        tag: CommandTag::Release,
        grammar: &END,
        usage: "release",
        summary: "let the button go",
    },
    CommandSpec {
        name: "click",
        tag: CommandTag::Click,
        grammar: &END,
        usage: "click",
        summary: "press for one tick, then release",
    },
    CommandSpec {
        name: "wait",
        tag: CommandTag::Wait,
        grammar: &WAIT_GRAMMAR,
        usage: "wait <150ms|2s>",
        summary: "advance simulated time, ticking the logger",
    },
    CommandSpec {
        name: "sensor",
        tag: CommandTag::Sensor,
        grammar: &SENSOR_GRAMMAR,
        usage: "sensor <temp> <humidity> | sensor nan",
        summary: "set the simulated reading",
    },
    CommandSpec {
        name: "clock",
        tag: CommandTag::Clock,
        grammar: &CLOCK_GRAMMAR,
        usage: "clock lose|keep",
        summary: "drop or restore the calendar clock's reference time",
    },
    CommandSpec {
        name: "card",
        tag: CommandTag::Card,
        grammar: &CARD_GRAMMAR,
        usage: "card insert|eject",
        summary: "insert or remove the storage card",
    },
    CommandSpec {
        name: "recovery",
        tag: CommandTag::Recovery,
        grammar: &RECOVERY_GRAMMAR,
        usage: "recovery \"MM_DD_YY[_HH[_mm[_SS]]]\"",
        summary: "write a time.txt recovery record to the card",
    },
    CommandSpec {
        name: "status",
        tag: CommandTag::Status,
        grammar: &END,
        usage: "status",
        summary: "print mode, session counters and the display",
    },
    CommandSpec {
        name: "help",
        tag: CommandTag::Help,
        grammar: &HELP_GRAMMAR,
        usage: "help [command]",
        summary: "list commands or describe one",
    },
];

/// Returns the full command catalog.
#[must_use]
pub const fn commands() -> &'static [CommandSpec] {
    &COMMANDS
}

/// Finds a command by name (case insensitive).
#[must_use]
pub fn find(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS
        .iter()
        .find(|command| command.name.eq_ignore_ascii_case(name))
}
