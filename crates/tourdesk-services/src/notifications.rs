//! Plain-text emails sent by the booking services
//!
//! Delivery goes through [`deliver`], which logs failures instead of
//! returning them: by the time a message is sent the change it describes is
//! already committed.

use chrono_tz::Tz;
use tourdesk_core::models::{
    format_local, CompensationLedger, CompensationScope, Excursion, Payment, Reservation, Session,
};
use tourdesk_core::traits::{Attachment, EmailMessage, NotificationSink};
use tracing::{debug, warn};

pub const CSV_CONTENT_TYPE: &str = "text/csv; charset=utf-8";

const SIGNATURE: &str = "Kind regards,\nTourdesk support";

/// Send and swallow the error
pub async fn deliver(notifier: &dyn NotificationSink, message: EmailMessage) {
    let to = message.to.clone();
    let subject = message.subject.clone();
    match notifier.send(message).await {
        Ok(()) => debug!("Sent \"{}\" to {}", subject, to),
        Err(e) => warn!(error = %e, "Failed to send \"{}\" to {}", subject, to),
    }
}

fn plain(to: &str, subject: &str, body: String) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: subject.to_string(),
        body,
        attachments: Vec::new(),
    }
}

pub fn booking_confirmation(
    reservation: &Reservation,
    session: &Session,
    excursion: &Excursion,
    tz: Tz,
) -> EmailMessage {
    let body = format!(
        "Hello, {name}!\n\n\
         Your booking is confirmed:\n\
         Excursion: {title}\n\
         Date and time: {start}\n\
         Participants: {count}\n\
         Meeting place: {place}\n\
         Organizer contact: {contact}\n\n\
         Booking number: {id}\n\n\
         Thank you for booking with us!\n{sig}",
        name = reservation.contact.full_name,
        title = excursion.title,
        start = format_local(session.start_at, tz),
        count = reservation.participants_count,
        place = excursion.place,
        contact = excursion.contact_email.as_deref().unwrap_or("not provided"),
        id = reservation.id,
        sig = SIGNATURE,
    );
    plain(&reservation.contact.email, "Your excursion booking is confirmed", body)
}

/// Sent when the booking owner cancels
pub fn owner_cancellation(
    reservation: &Reservation,
    session: &Session,
    excursion: &Excursion,
    refunded: Option<&Payment>,
    tz: Tz,
) -> EmailMessage {
    let refund_line = match refunded {
        Some(payment) => format!(
            "Refund amount: {:.2} {}\nThe money goes back to the card you paid with.\n\n",
            payment.amount, payment.currency
        ),
        None => String::new(),
    };
    let body = format!(
        "Hello, {name}!\n\n\
         Your booking #{id} for \"{title}\" on {start} has been cancelled.\n\n\
         Booking details:\n\
         - Participants: {count}\n\
         - Name: {name}\n\
         - Phone: {phone}\n\
         - Email: {email}\n\n\
         {refund_line}\
         If you did not request this, please contact support.\n\n{sig}",
        name = reservation.contact.full_name,
        id = reservation.id,
        title = excursion.title,
        start = format_local(session.start_at, tz),
        count = reservation.participants_count,
        phone = reservation.contact.phone_number,
        email = reservation.contact.email,
        refund_line = refund_line,
        sig = SIGNATURE,
    );
    plain(&reservation.contact.email, "Booking cancelled", body)
}

/// Sent when an administrator cancels a single booking
pub fn admin_cancellation(
    reservation: &Reservation,
    session: &Session,
    excursion: &Excursion,
    refunded: bool,
    tz: Tz,
) -> EmailMessage {
    let body = format!(
        "Hello, {name}!\n\n\
         Your booking for \"{title}\" (session {session_id}) on {start} \
         has been cancelled by an administrator.\n{refund}\n\
         We apologise for the inconvenience.\n{sig}",
        name = reservation.contact.full_name,
        title = excursion.title,
        session_id = session.id,
        start = format_local(session.start_at, tz),
        refund = refund_note(refunded),
        sig = SIGNATURE,
    );
    plain(&reservation.contact.email, "Booking cancelled by administrator", body)
}

/// Sent to every participant of a deleted session
pub fn session_cancelled(
    reservation: &Reservation,
    session: &Session,
    excursion: &Excursion,
    refunded: bool,
    tz: Tz,
) -> EmailMessage {
    let body = format!(
        "Hello, {name}!\n\n\
         The \"{title}\" session (ID {session_id}) on {start} has been cancelled.\n\
         Your booking was cancelled automatically.\n{refund}\n\
         We apologise for the inconvenience.\n{sig}",
        name = reservation.contact.full_name,
        title = excursion.title,
        session_id = session.id,
        start = format_local(session.start_at, tz),
        refund = refund_note(refunded),
        sig = SIGNATURE,
    );
    plain(&reservation.contact.email, "Excursion session cancelled", body)
}

/// Summary for the actor who deleted a session or excursion, with the export attached
pub fn deletion_summary(
    to: &str,
    scope: CompensationScope,
    excursion: &Excursion,
    ledger: &CompensationLedger,
    csv: Vec<u8>,
) -> EmailMessage {
    let (subject, what) = match scope {
        CompensationScope::Session(id) => (
            "Cancelled reservations for the deleted session",
            format!("Session {} of \"{}\" was deleted.", id, excursion.title),
        ),
        CompensationScope::Excursion(_) => (
            "Excursion deleted and its sessions cancelled",
            format!("The excursion \"{}\" and all its sessions were deleted.", excursion.title),
        ),
    };
    let body = format!(
        "Hello!\n\n{what}\n\
         Cancelled reservations: {count}\n\
         Refunded total: {total:.2}\n\n\
         The attached file lists every cancelled reservation.\n",
        what = what,
        count = ledger.len(),
        total = ledger.refunded_total(),
    );

    EmailMessage {
        to: to.to_string(),
        subject: subject.to_string(),
        body,
        attachments: vec![Attachment {
            filename: scope.export_filename(),
            content_type: CSV_CONTENT_TYPE.to_string(),
            data: csv,
        }],
    }
}

fn refund_note(refunded: bool) -> &'static str {
    if refunded {
        "The payment will be refunded shortly.\n"
    } else {
        ""
    }
}
