//! Built-in descriptors for the meetings dataset.

use crate::models::{ColumnDescriptor, MatchStyle, SchemaDescriptor, SemanticType};

use MatchStyle::{AvoidFullText, CaseInsensitivePartial};
use SemanticType::{LongText, Text, TextList, Timestamp, Uuid};

fn created_at() -> ColumnDescriptor {
    ColumnDescriptor::new(
        "created_at",
        Timestamp,
        "The date and time the row was created in the database.",
    )
}

fn partial(name: &str, semantic_type: SemanticType, description: &str) -> ColumnDescriptor {
    ColumnDescriptor::new(name, semantic_type, description).with_match_style(CaseInsensitivePartial)
}

fn meetings() -> SchemaDescriptor {
    SchemaDescriptor::new(
        "meetings",
        "Meeting notes for meetings that have taken place.",
    )
    .column(
        ColumnDescriptor::new("meeting_id", Uuid, "Unique identifier for the meeting.").hidden(),
    )
    .column(ColumnDescriptor::new(
        "beam_id",
        Uuid,
        "Public identifier for the meeting. Present it to the user wherever possible.",
    ))
    .column(partial("title", Text, "The title of the meeting."))
    .column(
        ColumnDescriptor::new("content", LongText, "The meeting notes recorded for the meeting.")
            .with_match_style(AvoidFullText),
    )
    .column(ColumnDescriptor::new(
        "date",
        Timestamp,
        "The date and time the meeting took place.",
    ))
    .column(created_at())
    .column(
        ColumnDescriptor::new(
            "firm_attended_id",
            Uuid,
            "The firm that attended the meeting. References firms.firm_id.",
        )
        .hidden(),
    )
    .note("When returning meetings, always include meetings.beam_id.")
    .note("Order meetings by date in ascending order.")
    .note("Contacts attending a meeting are linked through contact_meetings.")
    .note("Employees attending a meeting are linked through employee_meetings.")
    .note("Firms discussed in a meeting are linked through meeting_firms.")
}

fn firms() -> SchemaDescriptor {
    SchemaDescriptor::new(
        "firms",
        "Firms the company has interacted with or discussed in meetings.",
    )
    .column(ColumnDescriptor::new("firm_id", Uuid, "Unique identifier for the firm.").hidden())
    .column(partial("name", Text, "The name of the firm."))
    .column(partial("sector", Text, "The sector the firm operates in."))
    .column(created_at())
    .note(
        "A firm relates to a meeting either as the attending firm (meetings.firm_attended_id) \
         or as a discussed firm (meeting_firms). Consider both unless the question says which.",
    )
}

fn contacts() -> SchemaDescriptor {
    SchemaDescriptor::new(
        "contacts",
        "External contacts that work at firms the company has interacted with.",
    )
    .column(
        ColumnDescriptor::new("contact_id", Uuid, "Unique identifier for the contact.").hidden(),
    )
    .column(partial("name", Text, "The name of the contact."))
    .column(partial("email", Text, "The email address of the contact."))
    .column(partial("address", Text, "The address of the contact."))
    .column(
        ColumnDescriptor::new(
            "firm_id",
            Uuid,
            "The firm the contact works for. References firms.firm_id.",
        )
        .hidden(),
    )
    .column(created_at())
}

fn employees() -> SchemaDescriptor {
    SchemaDescriptor::new("employees", "Internal employees of the company.")
        .column(
            ColumnDescriptor::new("employee_id", Uuid, "Unique identifier for the employee.")
                .hidden(),
        )
        .column(partial("name", Text, "The name of the employee."))
        .column(partial("email", Text, "The email address of the employee."))
        .column(created_at())
}

fn link(name: &str, description: &str, left: (&str, &str), right: (&str, &str)) -> SchemaDescriptor {
    SchemaDescriptor::new(name, description)
        .column(ColumnDescriptor::new(left.0, Uuid, left.1).hidden())
        .column(ColumnDescriptor::new(right.0, Uuid, right.1).hidden())
        .note("Link table: only use it to join the two tables it references.")
}

fn meeting_notes() -> SchemaDescriptor {
    SchemaDescriptor::new(
        "meeting_notes",
        "Denormalized view with one row per meeting and its related names.",
    )
    .view()
    .column(ColumnDescriptor::new(
        "beam_id",
        Uuid,
        "Public identifier for the meeting. Present it to the user wherever possible.",
    ))
    .column(partial("title", Text, "The title of the meeting."))
    .column(
        ColumnDescriptor::new("content", LongText, "The meeting notes recorded for the meeting.")
            .with_match_style(AvoidFullText),
    )
    .column(ColumnDescriptor::new(
        "date",
        Timestamp,
        "The date and time the meeting took place.",
    ))
    .column(partial(
        "firm_attended",
        Text,
        "Name of the firm that attended the meeting.",
    ))
    .column(partial(
        "firm_attended_sector",
        Text,
        "Sector of the firm that attended the meeting.",
    ))
    .column(partial(
        "firms_discussed",
        TextList,
        "Names of the firms discussed in the meeting.",
    ))
    .column(partial(
        "contacts",
        TextList,
        "Names of the external contacts that attended the meeting.",
    ))
    .column(partial(
        "employees",
        TextList,
        "Names of the internal employees that attended the meeting.",
    ))
    .note("Prefer this view for questions that only need names, not identifiers.")
    .note("Order meetings by date in ascending order.")
}

pub(super) fn descriptors() -> Vec<SchemaDescriptor> {
    vec![
        meetings(),
        firms(),
        contacts(),
        employees(),
        link(
            "meeting_firms",
            "Firms discussed in each meeting.",
            ("meeting_id", "References meetings.meeting_id."),
            ("firm_id", "References firms.firm_id."),
        ),
        link(
            "contact_meetings",
            "External contacts that attended each meeting.",
            ("contact_id", "References contacts.contact_id."),
            ("meeting_id", "References meetings.meeting_id."),
        ),
        link(
            "employee_meetings",
            "Internal employees that attended each meeting.",
            ("employee_id", "References employees.employee_id."),
            ("meeting_id", "References meetings.meeting_id."),
        ),
        meeting_notes(),
    ]
}
