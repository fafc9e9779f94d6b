use std::collections::HashMap;

use serde_json::Value;

use crate::api::WebhookError;
use crate::payload::{Attachment, RawPayload};

/// The seven event notifications the provider delivers, as a closed set:
/// the webhook protocol fixes the variants, implementers do not extend them.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Bounce(Bounce),
    Click(Click),
    Complaint(Complaint),
    Delivered(Delivered),
    Drop(Drop),
    Open(Open),
    Unsubscribe(Unsubscribe),
}

macro_rules! shared_field {
    ($self:ident, $field:ident) => {
        match $self {
            Event::Bounce(e) => e.$field.as_str(),
            Event::Click(e) => e.$field.as_str(),
            Event::Complaint(e) => e.$field.as_str(),
            Event::Delivered(e) => e.$field.as_str(),
            Event::Drop(e) => e.$field.as_str(),
            Event::Open(e) => e.$field.as_str(),
            Event::Unsubscribe(e) => e.$field.as_str(),
        }
    };
}

impl Event {
    /// Resolves the payload's `event` field into a variant and populates its
    /// record: declared fields are consumed by name, whatever the provider
    /// sent on top lands in the custom-variables bucket, and file parts are
    /// carried on the variants that can legitimately receive them.
    pub fn from_payload(mut payload: RawPayload) -> Result<Event, WebhookError> {
        let name = match payload.first("event") {
            Some(name) if !name.is_empty() => name.to_owned(),
            _ => return Err(WebhookError::MissingEventName),
        };

        let event = match name.as_str() {
            "bounced" => Event::Bounce(Bounce::decode(&mut payload)),
            "clicked" => Event::Click(Click::decode(&mut payload)),
            "complained" => Event::Complaint(Complaint::decode(&mut payload)),
            "delivered" => Event::Delivered(Delivered::decode(&mut payload)),
            "dropped" => Event::Drop(Drop::decode(&mut payload)),
            "opened" => Event::Open(Open::decode(&mut payload)),
            "unsubscribed" => Event::Unsubscribe(Unsubscribe::decode(&mut payload)),
            _ => return Err(WebhookError::UnknownEvent(name)),
        };
        Ok(event)
    }

    /// The wire event name that selected this variant.
    pub fn name(&self) -> &str {
        shared_field!(self, event)
    }

    /// Seconds since epoch, as transmitted.
    pub fn timestamp(&self) -> &str {
        shared_field!(self, timestamp)
    }

    /// The random opaque token paired with the timestamp for signing.
    pub fn token(&self) -> &str {
        shared_field!(self, token)
    }

    /// Hex-encoded HMAC supplied by the provider.
    pub fn signature(&self) -> &str {
        shared_field!(self, signature)
    }
}

type Slot<T> = fn(&mut T, String);

/// Assigns the first value of every declared wire name into its slot,
/// consuming the field either way so only undeclared names remain.
fn populate<T: Default>(payload: &mut RawPayload, table: &[(&str, Slot<T>)]) -> T {
    let mut record = T::default();
    for (name, slot) in table {
        if let Some(value) = payload.take_first(name) {
            slot(&mut record, value);
        }
    }
    record
}

/// Permanent delivery failure reported by the recipient server.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bounce {
    pub event: String,
    pub recipient: String,
    pub domain: String,
    /// All MIME headers of the original message, dumped to a JSON string.
    pub message_headers: String,
    /// SMTP bounce error code in X.X.X form.
    pub code: String,
    pub error: String,
    /// Detailed reason for bouncing, when the recipient server gave one.
    pub notification: String,
    pub campaign_id: String,
    pub campaign_name: String,
    pub tag: String,
    pub mailing_list: String,
    pub custom_variables: HashMap<String, Value>,
    pub timestamp: String,
    pub token: String,
    pub signature: String,
    /// Files the recipient server included in the bounce message.
    pub attachments: Vec<Attachment>,
}

const BOUNCE_FIELDS: &[(&str, Slot<Bounce>)] = &[
    ("event", |e, v| e.event = v),
    ("recipient", |e, v| e.recipient = v),
    ("domain", |e, v| e.domain = v),
    ("message-headers", |e, v| e.message_headers = v),
    ("code", |e, v| e.code = v),
    ("error", |e, v| e.error = v),
    ("notification", |e, v| e.notification = v),
    ("campaign-id", |e, v| e.campaign_id = v),
    ("campaign-name", |e, v| e.campaign_name = v),
    ("tag", |e, v| e.tag = v),
    ("mailing-list", |e, v| e.mailing_list = v),
    ("timestamp", |e, v| e.timestamp = v),
    ("token", |e, v| e.token = v),
    ("signature", |e, v| e.signature = v),
];

impl Bounce {
    fn decode(payload: &mut RawPayload) -> Self {
        let mut record = populate(payload, BOUNCE_FIELDS);
        record.custom_variables = payload.drain_custom_variables();
        record.attachments = payload.take_attachments();
        record
    }
}

/// Recipient clicked a tracked link in the message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Click {
    pub event: String,
    pub recipient: String,
    pub domain: String,
    pub ip: String,
    pub country: String,
    pub region: String,
    pub city: String,
    pub user_agent: String,
    pub device_type: String,
    pub client_type: String,
    pub client_name: String,
    pub client_os: String,
    pub campaign_id: String,
    pub campaign_name: String,
    pub tag: String,
    pub mailing_list: String,
    /// The URL that was clicked.
    pub url: String,
    pub custom_variables: HashMap<String, Value>,
    pub timestamp: String,
    pub token: String,
    pub signature: String,
}

const CLICK_FIELDS: &[(&str, Slot<Click>)] = &[
    ("event", |e, v| e.event = v),
    ("recipient", |e, v| e.recipient = v),
    ("domain", |e, v| e.domain = v),
    ("ip", |e, v| e.ip = v),
    ("country", |e, v| e.country = v),
    ("region", |e, v| e.region = v),
    ("city", |e, v| e.city = v),
    ("user-agent", |e, v| e.user_agent = v),
    ("device-type", |e, v| e.device_type = v),
    ("client-type", |e, v| e.client_type = v),
    ("client-name", |e, v| e.client_name = v),
    ("client-os", |e, v| e.client_os = v),
    ("campaign-id", |e, v| e.campaign_id = v),
    ("campaign-name", |e, v| e.campaign_name = v),
    ("tag", |e, v| e.tag = v),
    ("mailing-list", |e, v| e.mailing_list = v),
    ("url", |e, v| e.url = v),
    ("timestamp", |e, v| e.timestamp = v),
    ("token", |e, v| e.token = v),
    ("signature", |e, v| e.signature = v),
];

impl Click {
    fn decode(payload: &mut RawPayload) -> Self {
        let mut record = populate(payload, CLICK_FIELDS);
        record.custom_variables = payload.drain_custom_variables();
        record
    }
}

/// Recipient marked the message as spam.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Complaint {
    pub event: String,
    pub recipient: String,
    pub domain: String,
    pub message_headers: String,
    pub campaign_id: String,
    pub campaign_name: String,
    pub tag: String,
    pub mailing_list: String,
    pub custom_variables: HashMap<String, Value>,
    pub timestamp: String,
    pub token: String,
    pub signature: String,
    pub attachments: Vec<Attachment>,
}

const COMPLAINT_FIELDS: &[(&str, Slot<Complaint>)] = &[
    ("event", |e, v| e.event = v),
    ("recipient", |e, v| e.recipient = v),
    ("domain", |e, v| e.domain = v),
    ("message-headers", |e, v| e.message_headers = v),
    ("campaign-id", |e, v| e.campaign_id = v),
    ("campaign-name", |e, v| e.campaign_name = v),
    ("tag", |e, v| e.tag = v),
    ("mailing-list", |e, v| e.mailing_list = v),
    ("timestamp", |e, v| e.timestamp = v),
    ("token", |e, v| e.token = v),
    ("signature", |e, v| e.signature = v),
];

impl Complaint {
    fn decode(payload: &mut RawPayload) -> Self {
        let mut record = populate(payload, COMPLAINT_FIELDS);
        record.custom_variables = payload.drain_custom_variables();
        record.attachments = payload.take_attachments();
        record
    }
}

/// Message accepted by the recipient server.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Delivered {
    pub event: String,
    pub recipient: String,
    pub domain: String,
    pub message_headers: String,
    /// Id of the original message, as assigned on submission.
    pub message_id: String,
    pub custom_variables: HashMap<String, Value>,
    pub timestamp: String,
    pub token: String,
    pub signature: String,
}

const DELIVERED_FIELDS: &[(&str, Slot<Delivered>)] = &[
    ("event", |e, v| e.event = v),
    ("recipient", |e, v| e.recipient = v),
    ("domain", |e, v| e.domain = v),
    ("message-headers", |e, v| e.message_headers = v),
    ("Message-Id", |e, v| e.message_id = v),
    ("timestamp", |e, v| e.timestamp = v),
    ("token", |e, v| e.token = v),
    ("signature", |e, v| e.signature = v),
];

impl Delivered {
    fn decode(payload: &mut RawPayload) -> Self {
        let mut record = populate(payload, DELIVERED_FIELDS);
        record.custom_variables = payload.drain_custom_variables();
        record
    }
}

/// Message dropped before delivery was attempted, or after retries ran out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Drop {
    pub event: String,
    pub recipient: String,
    pub domain: String,
    pub message_headers: String,
    /// "hardfail" or "old".
    pub reason: String,
    pub code: String,
    pub description: String,
    pub custom_variables: HashMap<String, Value>,
    pub timestamp: String,
    pub token: String,
    pub signature: String,
    pub attachments: Vec<Attachment>,
}

const DROP_FIELDS: &[(&str, Slot<Drop>)] = &[
    ("event", |e, v| e.event = v),
    ("recipient", |e, v| e.recipient = v),
    ("domain", |e, v| e.domain = v),
    ("message-headers", |e, v| e.message_headers = v),
    ("reason", |e, v| e.reason = v),
    ("code", |e, v| e.code = v),
    ("description", |e, v| e.description = v),
    ("timestamp", |e, v| e.timestamp = v),
    ("token", |e, v| e.token = v),
    ("signature", |e, v| e.signature = v),
];

impl Drop {
    fn decode(payload: &mut RawPayload) -> Self {
        let mut record = populate(payload, DROP_FIELDS);
        record.custom_variables = payload.drain_custom_variables();
        record.attachments = payload.take_attachments();
        record
    }
}

/// Recipient opened the message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Open {
    pub event: String,
    pub recipient: String,
    pub domain: String,
    pub ip: String,
    pub country: String,
    pub region: String,
    pub city: String,
    pub user_agent: String,
    pub device_type: String,
    pub client_type: String,
    pub client_name: String,
    pub client_os: String,
    pub campaign_id: String,
    pub campaign_name: String,
    pub tag: String,
    pub mailing_list: String,
    pub custom_variables: HashMap<String, Value>,
    pub timestamp: String,
    pub token: String,
    pub signature: String,
}

const OPEN_FIELDS: &[(&str, Slot<Open>)] = &[
    ("event", |e, v| e.event = v),
    ("recipient", |e, v| e.recipient = v),
    ("domain", |e, v| e.domain = v),
    ("ip", |e, v| e.ip = v),
    ("country", |e, v| e.country = v),
    ("region", |e, v| e.region = v),
    ("city", |e, v| e.city = v),
    ("user-agent", |e, v| e.user_agent = v),
    ("device-type", |e, v| e.device_type = v),
    ("client-type", |e, v| e.client_type = v),
    ("client-name", |e, v| e.client_name = v),
    ("client-os", |e, v| e.client_os = v),
    ("campaign-id", |e, v| e.campaign_id = v),
    ("campaign-name", |e, v| e.campaign_name = v),
    ("tag", |e, v| e.tag = v),
    ("mailing-list", |e, v| e.mailing_list = v),
    ("timestamp", |e, v| e.timestamp = v),
    ("token", |e, v| e.token = v),
    ("signature", |e, v| e.signature = v),
];

impl Open {
    fn decode(payload: &mut RawPayload) -> Self {
        let mut record = populate(payload, OPEN_FIELDS);
        record.custom_variables = payload.drain_custom_variables();
        record
    }
}

/// Recipient clicked the unsubscribe link.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Unsubscribe {
    pub event: String,
    pub recipient: String,
    pub domain: String,
    pub ip: String,
    pub country: String,
    pub region: String,
    pub city: String,
    pub user_agent: String,
    pub device_type: String,
    pub client_type: String,
    pub client_name: String,
    pub client_os: String,
    pub campaign_id: String,
    pub campaign_name: String,
    pub tag: String,
    pub mailing_list: String,
    pub custom_variables: HashMap<String, Value>,
    pub timestamp: String,
    pub token: String,
    pub signature: String,
}

const UNSUBSCRIBE_FIELDS: &[(&str, Slot<Unsubscribe>)] = &[
    ("event", |e, v| e.event = v),
    ("recipient", |e, v| e.recipient = v),
    ("domain", |e, v| e.domain = v),
    ("ip", |e, v| e.ip = v),
    ("country", |e, v| e.country = v),
    ("region", |e, v| e.region = v),
    ("city", |e, v| e.city = v),
    ("user-agent", |e, v| e.user_agent = v),
    ("device-type", |e, v| e.device_type = v),
    ("client-type", |e, v| e.client_type = v),
    ("client-name", |e, v| e.client_name = v),
    ("client-os", |e, v| e.client_os = v),
    ("campaign-id", |e, v| e.campaign_id = v),
    ("campaign-name", |e, v| e.campaign_name = v),
    ("tag", |e, v| e.tag = v),
    ("mailing-list", |e, v| e.mailing_list = v),
    ("timestamp", |e, v| e.timestamp = v),
    ("token", |e, v| e.token = v),
    ("signature", |e, v| e.signature = v),
];

impl Unsubscribe {
    fn decode(payload: &mut RawPayload) -> Self {
        let mut record = populate(payload, UNSUBSCRIBE_FIELDS);
        record.custom_variables = payload.drain_custom_variables();
        record
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use serde_json::json;

    use super::Event;
    use crate::api::WebhookError;
    use crate::payload::RawPayload;

    async fn decode(body: &'static str) -> Result<Event, WebhookError> {
        let payload = RawPayload::from_bytes(None, Bytes::from_static(body.as_bytes())).await?;
        Event::from_payload(payload)
    }

    #[tokio::test]
    async fn resolves_all_seven_variants() {
        let table = [
            ("event=bounced&recipient=r", "bounced"),
            ("event=clicked&url=https%3A%2F%2Fexample.com", "clicked"),
            ("event=complained&recipient=r", "complained"),
            ("event=delivered&recipient=r", "delivered"),
            ("event=dropped&reason=hardfail", "dropped"),
            ("event=opened&city=Dublin", "opened"),
            ("event=unsubscribed&recipient=r", "unsubscribed"),
        ];
        for (body, want) in table {
            let event = decode(body).await.expect("failed to decode");
            assert_eq!(event.name(), want, "payload: {body}");
        }
    }

    #[tokio::test]
    async fn rejects_bogus_event() {
        let err = decode("event=bogus").await.expect_err("bogus event");
        assert!(matches!(err, WebhookError::UnknownEvent(name) if name == "bogus"));
    }

    #[tokio::test]
    async fn rejects_missing_event() {
        let err = decode("recipient=r").await.expect_err("no event field");
        assert!(matches!(err, WebhookError::MissingEventName));

        let err = decode("event=").await.expect_err("empty event field");
        assert!(matches!(err, WebhookError::MissingEventName));
    }

    #[tokio::test]
    async fn event_resolution_is_case_sensitive() {
        let err = decode("event=Bounced").await.expect_err("wrong case");
        assert!(matches!(err, WebhookError::UnknownEvent(_)));
    }

    #[tokio::test]
    async fn populates_declared_fields_by_wire_name() {
        let event = decode(
            "event=bounced&recipient=alice%40example.com&domain=example.com\
             &code=5.1.1&error=mailbox%20not%20found&campaign-id=42\
             &timestamp=1665514200&token=tok&signature=sig",
        )
        .await
        .expect("failed to decode");

        let Event::Bounce(bounce) = event else {
            panic!("expected a bounce");
        };
        assert_eq!(bounce.event, "bounced");
        assert_eq!(bounce.recipient, "alice@example.com");
        assert_eq!(bounce.domain, "example.com");
        assert_eq!(bounce.code, "5.1.1");
        assert_eq!(bounce.error, "mailbox not found");
        assert_eq!(bounce.campaign_id, "42");
        assert_eq!(bounce.timestamp, "1665514200");
        assert_eq!(bounce.token, "tok");
        assert_eq!(bounce.signature, "sig");
        assert!(bounce.custom_variables.is_empty());
        assert!(bounce.attachments.is_empty());
    }

    #[tokio::test]
    async fn undeclared_fields_land_in_custom_variables() {
        let event = decode(
            "event=opened&recipient=r&my-order-id=1337&ab-test=blue&discarded=",
        )
        .await
        .expect("failed to decode");

        let Event::Open(open) = event else {
            panic!("expected an open");
        };
        assert_eq!(open.recipient, "r");
        assert_eq!(open.custom_variables.get("my-order-id"), Some(&json!("1337")));
        assert_eq!(open.custom_variables.get("ab-test"), Some(&json!("blue")));
        // Documented fields never appear in the bucket, empty values are skipped
        assert!(!open.custom_variables.contains_key("recipient"));
        assert!(!open.custom_variables.contains_key("event"));
        assert!(!open.custom_variables.contains_key("discarded"));
    }

    #[tokio::test]
    async fn shared_accessors_cover_every_variant() {
        let event = decode("event=unsubscribed&timestamp=17&token=t&signature=s")
            .await
            .expect("failed to decode");
        assert_eq!(event.name(), "unsubscribed");
        assert_eq!(event.timestamp(), "17");
        assert_eq!(event.token(), "t");
        assert_eq!(event.signature(), "s");
    }

    #[tokio::test]
    async fn attachments_are_carried_on_bounces() {
        let body = Bytes::from_static(
            b"--b\r\n\
              Content-Disposition: form-data; name=\"event\"\r\n\r\n\
              bounced\r\n\
              --b\r\n\
              Content-Disposition: form-data; name=\"attachment-1\"; filename=\"dsn.eml\"\r\n\r\n\
              delivery status notification\r\n\
              --b--\r\n",
        );
        let payload = RawPayload::from_bytes(Some("multipart/form-data; boundary=b"), body)
            .await
            .expect("failed to decode");
        let event = Event::from_payload(payload).expect("failed to resolve");

        let Event::Bounce(bounce) = event else {
            panic!("expected a bounce");
        };
        assert_eq!(bounce.attachments.len(), 1);
        assert_eq!(bounce.attachments[0].filename, "dsn.eml");
        assert_eq!(&bounce.attachments[0].data[..], b"delivery status notification");
    }
}
