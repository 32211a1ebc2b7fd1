//! Outbound email: booking confirmations, cancellations, and class reminders.

use anyhow::Context;
use askama::Template;
use mailgun_v3::email::{self, Message, MessageBody};
use mailgun_v3::{Credentials, EmailAddress};
use sqlx::PgPool;
use time::{Duration, OffsetDateTime};
use tokio::time::interval;

use crate::email::booking::ClassReminderEmail;
use crate::models::booking::Booking;
use crate::models::fitness_class::FitnessClass;
use crate::models::member::Member;
use crate::util::current_time;

pub mod booking;

pub const MAILGUN_NAME: &str = "Pulse Fitness";
pub const MAILGUN_EMAIL: &str = "bookings@mail.pulsefitness.studio";
pub const MAILGUN_DOMAIN: &str = "mail.pulsefitness.studio";

pub trait Email: Template {
    fn subject(&self) -> String;
    fn address(&self) -> EmailAddress;
}

pub async fn send_email(email: impl Email) -> anyhow::Result<()> {
    let token = std::env::var("MAILGUN_TOKEN").context("`MAILGUN_TOKEN` not set")?;
    let creds = Credentials::new(token, MAILGUN_DOMAIN);

    let sender = EmailAddress::name_address(MAILGUN_NAME, MAILGUN_EMAIL);
    let message = Message {
        to: vec![email.address()],
        subject: email.subject(),
        body: MessageBody::Html(email.render().context("Failed to render email")?),
        ..Default::default()
    };

    email::async_impl::send_email(&creds, &sender, message)
        .await
        .map(|_| ())
        .map_err(|err| anyhow::anyhow!("Failed to send email: {err}"))
}

/// Reminds members about their classes starting in the next day.
///
/// Spawned once at startup; each pass covers the classes that entered
/// the 24-hour horizon since the last one, so nothing is reminded twice.
pub async fn run_reminder_loop(interval_seconds: u64, pool: PgPool) {
    let mut interval = interval(tokio::time::Duration::from_secs(interval_seconds));
    let mut last_run = current_time();

    loop {
        interval.tick().await;
        let now = current_time();

        println!(
            "Sending reminders for classes from {:?} to {:?}",
            last_run + Duration::days(1),
            now + Duration::days(1)
        );
        send_reminders(last_run, now, &pool).await;
        last_run = now;
    }
}

async fn send_reminders(from: OffsetDateTime, to: OffsetDateTime, pool: &PgPool) {
    let one_day = Duration::days(1);
    let classes = match FitnessClass::starting_between(from + one_day, to + one_day, pool).await {
        Ok(classes) => classes,
        Err(error) => {
            eprintln!(
                "Failed to load classes to send reminders about: {:?}",
                error.message
            );
            return;
        }
    };
    println!(
        "Found {} classes: {}",
        classes.len(),
        classes
            .iter()
            .map(|class| format!("`{}`", class.name))
            .collect::<Vec<_>>()
            .join(", ")
    );

    for class in classes {
        let bookings = match Booking::active_for_class(class.id, pool).await {
            Ok(bookings) => bookings,
            Err(error) => {
                eprintln!(
                    "Failed to load the roster for class `{}`: {:?}",
                    class.name, error.message
                );
                continue;
            }
        };

        for booking in bookings {
            let member = match Member::with_email(&booking.member, pool).await {
                Ok(member) => member,
                Err(error) => {
                    eprintln!(
                        "Failed to load member {} for a reminder: {:?}",
                        booking.member, error.message
                    );
                    continue;
                }
            };

            if let Err(error) = send_email(ClassReminderEmail::new(&member, &class)).await {
                eprintln!(
                    "Failed to send reminder for class `{}` to {}: {:?}",
                    class.name, member.email, error
                );
            }
        }
    }
}
