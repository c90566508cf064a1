//! SeaORM entity models
//!
//! Database entities for Tutorly, plus the string-backed enums stored in
//! their text columns.

mod user;
mod professor;
mod module;
mod chapter;
mod sheet;
mod sheet_unlock;
mod token_balance;
mod subscription_plan;
mod subscription;
mod payment;
mod invoice;
mod promotional_code;
mod sms_validation_code;
mod email_validation_code;
mod faq;
mod past_paper;

use crate::errors::AppError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use user::{
    Entity as UserEntity,
    Model as User,
    ActiveModel as UserActiveModel,
    Column as UserColumn,
};

pub use professor::{
    Entity as ProfessorEntity,
    Model as Professor,
    ActiveModel as ProfessorActiveModel,
    Column as ProfessorColumn,
};

pub use module::{
    Entity as ModuleEntity,
    Model as Module,
    ActiveModel as ModuleActiveModel,
    Column as ModuleColumn,
};

pub use chapter::{
    Entity as ChapterEntity,
    Model as Chapter,
    ActiveModel as ChapterActiveModel,
    Column as ChapterColumn,
};

pub use sheet::{
    Entity as SheetEntity,
    Model as Sheet,
    ActiveModel as SheetActiveModel,
    Column as SheetColumn,
};

pub use sheet_unlock::{
    Entity as SheetUnlockEntity,
    Model as SheetUnlock,
    ActiveModel as SheetUnlockActiveModel,
    Column as SheetUnlockColumn,
};

pub use token_balance::{
    Entity as TokenBalanceEntity,
    Model as TokenBalance,
    ActiveModel as TokenBalanceActiveModel,
    Column as TokenBalanceColumn,
};

pub use subscription_plan::{
    Entity as SubscriptionPlanEntity,
    Model as SubscriptionPlan,
    ActiveModel as SubscriptionPlanActiveModel,
    Column as SubscriptionPlanColumn,
};

pub use subscription::{
    Entity as SubscriptionEntity,
    Model as Subscription,
    ActiveModel as SubscriptionActiveModel,
    Column as SubscriptionColumn,
};

pub use payment::{
    Entity as PaymentEntity,
    Model as Payment,
    ActiveModel as PaymentActiveModel,
    Column as PaymentColumn,
};

pub use invoice::{
    Entity as InvoiceEntity,
    Model as Invoice,
    ActiveModel as InvoiceActiveModel,
    Column as InvoiceColumn,
};

pub use promotional_code::{
    Entity as PromotionalCodeEntity,
    Model as PromotionalCode,
    ActiveModel as PromotionalCodeActiveModel,
    Column as PromotionalCodeColumn,
};

pub use sms_validation_code::{
    Entity as SmsValidationCodeEntity,
    Model as SmsValidationCode,
    ActiveModel as SmsValidationCodeActiveModel,
    Column as SmsValidationCodeColumn,
};

pub use email_validation_code::{
    Entity as EmailValidationCodeEntity,
    Model as EmailValidationCode,
    ActiveModel as EmailValidationCodeActiveModel,
    Column as EmailValidationCodeColumn,
};

pub use faq::{
    Entity as FaqEntity,
    Model as Faq,
    ActiveModel as FaqActiveModel,
    Column as FaqColumn,
};

pub use past_paper::{
    Entity as PastPaperEntity,
    Model as PastPaper,
    ActiveModel as PastPaperActiveModel,
    Column as PastPaperColumn,
};

/// Declares an enum persisted as lower-case text.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = AppError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(AppError::InvalidFormat {
                        message: format!("unknown {} '{}'", stringify!($name), other),
                    }),
                }
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.as_str().to_string()
            }
        }
    };
}

text_enum!(
    /// Role of a `users` row
    Role {
        Student => "student",
        Parent => "parent",
    }
);

text_enum!(
    SheetKind {
        Lesson => "lesson",
        Exercise => "exercise",
        Summary => "summary",
    }
);

text_enum!(
    BillingInterval {
        Month => "month",
        Year => "year",
    }
);

text_enum!(
    /// Subset of Stripe subscription states the platform acts on
    SubscriptionStatus {
        Incomplete => "incomplete",
        Active => "active",
        PastDue => "past_due",
        Canceled => "canceled",
    }
);

text_enum!(
    PaymentStatus {
        Pending => "pending",
        Succeeded => "succeeded",
        Failed => "failed",
        Refunded => "refunded",
    }
);

text_enum!(
    InvoiceStatus {
        Open => "open",
        Paid => "paid",
        Void => "void",
    }
);

text_enum!(
    FaqAudience {
        Student => "student",
        Parent => "parent",
        Professor => "professor",
        All => "all",
    }
);

impl SubscriptionStatus {
    /// Map a raw Stripe status; unknown and terminal states collapse to the closest one
    pub fn from_stripe(status: &str) -> Self {
        match status {
            "active" | "trialing" => SubscriptionStatus::Active,
            "past_due" | "unpaid" => SubscriptionStatus::PastDue,
            "canceled" | "incomplete_expired" => SubscriptionStatus::Canceled,
            _ => SubscriptionStatus::Incomplete,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_enum_round_trip() {
        assert_eq!("parent".parse::<Role>().unwrap(), Role::Parent);
        assert_eq!(SubscriptionStatus::PastDue.as_str(), "past_due");
        assert_eq!(String::from(SheetKind::Summary), "summary");
    }

    #[test]
    fn test_text_enum_rejects_unknown() {
        let err = "teacher".parse::<Role>().unwrap_err();
        assert!(err.to_string().contains("Role"));
    }

    #[test]
    fn test_serde_matches_column_text() {
        let json = serde_json::to_string(&SubscriptionStatus::PastDue).unwrap();
        assert_eq!(json, "\"past_due\"");
        let audience: FaqAudience = serde_json::from_str("\"all\"").unwrap();
        assert_eq!(audience, FaqAudience::All);
    }

    #[test]
    fn test_stripe_status_mapping() {
        assert_eq!(SubscriptionStatus::from_stripe("trialing"), SubscriptionStatus::Active);
        assert_eq!(SubscriptionStatus::from_stripe("unpaid"), SubscriptionStatus::PastDue);
        assert_eq!(
            SubscriptionStatus::from_stripe("incomplete_expired"),
            SubscriptionStatus::Canceled
        );
        assert_eq!(SubscriptionStatus::from_stripe("paused"), SubscriptionStatus::Incomplete);
    }
}
