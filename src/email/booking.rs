use askama::Template;
use mailgun_v3::EmailAddress;

use crate::email::Email;
use crate::models::fitness_class::FitnessClass;
use crate::models::member::Member;
use crate::util::format_datetime;

#[derive(Template)]
#[template(path = "booking-confirmation.html")]
pub struct BookingConfirmationEmail<'a> {
    pub member: &'a Member,
    pub class: &'a FitnessClass,
    pub starts_at: String,
}

impl<'a> BookingConfirmationEmail<'a> {
    pub fn new(member: &'a Member, class: &'a FitnessClass) -> Self {
        Self {
            member,
            class,
            starts_at: format_datetime(class.start_time),
        }
    }
}

impl<'a> Email for BookingConfirmationEmail<'a> {
    fn subject(&self) -> String {
        format!("Booking Confirmation: {}", self.class.name)
    }

    fn address(&self) -> EmailAddress {
        EmailAddress::name_address(self.member.full_name_inner().as_str(), self.member.email.as_str())
    }
}

#[derive(Template)]
#[template(path = "booking-cancelled.html")]
pub struct BookingCancelledEmail<'a> {
    pub member: &'a Member,
    pub class: &'a FitnessClass,
    pub reason: Option<String>,
    pub starts_at: String,
}

impl<'a> BookingCancelledEmail<'a> {
    pub fn new(member: &'a Member, class: &'a FitnessClass, reason: Option<String>) -> Self {
        Self {
            member,
            class,
            reason,
            starts_at: format_datetime(class.start_time),
        }
    }
}

impl<'a> Email for BookingCancelledEmail<'a> {
    fn subject(&self) -> String {
        format!("Booking Cancelled: {}", self.class.name)
    }

    fn address(&self) -> EmailAddress {
        EmailAddress::name_address(self.member.full_name_inner().as_str(), self.member.email.as_str())
    }
}

#[derive(Template)]
#[template(path = "class-reminder.html")]
pub struct ClassReminderEmail<'a> {
    pub member: &'a Member,
    pub class: &'a FitnessClass,
    pub starts_at: String,
}

impl<'a> ClassReminderEmail<'a> {
    pub fn new(member: &'a Member, class: &'a FitnessClass) -> Self {
        Self {
            member,
            class,
            starts_at: format_datetime(class.start_time),
        }
    }
}

impl<'a> Email for ClassReminderEmail<'a> {
    fn subject(&self) -> String {
        format!("Reminder: {} is Tomorrow", self.class.name)
    }

    fn address(&self) -> EmailAddress {
        EmailAddress::name_address(self.member.full_name_inner().as_str(), self.member.email.as_str())
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use crate::models::fitness_class::ClassCategory;
    use crate::models::member::Role;

    use super::*;

    fn member() -> Member {
        Member {
            email: "sarah@example.com".to_owned(),
            first_name: "Sarah".to_owned(),
            last_name: "Connor".to_owned(),
            phone_number: None,
            role: Role::Member,
            pass_hash: String::new(),
        }
    }

    fn cycling_class() -> FitnessClass {
        FitnessClass {
            id: 4,
            name: "Power Cycling".to_owned(),
            description: "Intense cycling class".to_owned(),
            category: ClassCategory::Cycling,
            capacity: 20,
            price: 1200,
            location: "Spin Room".to_owned(),
            is_active: true,
            image: None,
            instructor: "jane.doe@pulsefitness.studio".to_owned(),
            start_time: datetime!(2025-06-02 18:00:00 UTC),
            end_time: datetime!(2025-06-02 19:00:00 UTC),
            created: datetime!(2025-05-01 12:00:00 UTC),
        }
    }

    #[test]
    fn confirmation_email_names_the_class_and_location() {
        let member = member();
        let class = cycling_class();
        let email = BookingConfirmationEmail::new(&member, &class);

        assert_eq!(email.subject(), "Booking Confirmation: Power Cycling");

        let body = email.render().unwrap();
        assert!(body.contains("Power Cycling"));
        assert!(body.contains("Spin Room"));
        assert!(body.contains("2025-06-02 18:00"));
    }

    #[test]
    fn cancellation_email_includes_the_reason_when_given() {
        let member = member();
        let class = cycling_class();

        let email =
            BookingCancelledEmail::new(&member, &class, Some("Change of plans".to_owned()));
        assert_eq!(email.subject(), "Booking Cancelled: Power Cycling");
        assert!(email.render().unwrap().contains("Change of plans"));

        let no_reason = BookingCancelledEmail::new(&member, &class, None);
        assert!(!no_reason.render().unwrap().contains("Reason"));
    }

    #[test]
    fn reminder_email_names_the_class() {
        let member = member();
        let class = cycling_class();
        let email = ClassReminderEmail::new(&member, &class);

        assert_eq!(email.subject(), "Reminder: Power Cycling is Tomorrow");
        assert!(email.render().unwrap().contains("Power Cycling"));
    }
}
