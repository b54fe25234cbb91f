//! Processor result codes mapped to shopper-safe messages.

use serde::Serialize;

/// Code the processor uses for unexpected failures on its side.
pub const UNEXPECTED_ERROR_CODE: &str = "EX";

pub const INVALID_REQUEST: &str = "PaymentDealer.DoDirectPayment3dRequest.InvalidRequest";
pub const REDIRECT_URL_REQUIRED: &str = "PaymentDealer.DoDirectPayment3dRequest.RedirectUrlRequired";
pub const INVALID_CARD_INFO: &str = "PaymentDealer.CheckCardInfo.InvalidCardInfo";

const SYSTEM_ERROR_MESSAGE: &str = "A system error occurred. Please try again or contact support.";
const GENERIC_MESSAGE: &str =
    "An unexpected error occurred during payment processing. Please try again.";

const MESSAGES: &[(&str, &str)] = &[
    (
        "PaymentDealer.CheckPaymentDealerAuthentication.InvalidRequest",
        "Payment configuration error. Please contact the merchant.",
    ),
    (
        "PaymentDealer.CheckPaymentDealerAuthentication.InvalidAccount",
        "Merchant account not found. Please contact the merchant.",
    ),
    (
        "PaymentDealer.CheckPaymentDealerAuthentication.VirtualPosNotFound",
        "Payment terminal not configured. Please contact the merchant.",
    ),
    (
        "PaymentDealer.CheckDealerPaymentLimits.DailyDealerLimitExceeded",
        "Merchant daily transaction limit exceeded. Please try again tomorrow or contact the merchant.",
    ),
    (
        "PaymentDealer.CheckDealerPaymentLimits.DailyCardLimitExceeded",
        "Your card has reached its daily transaction limit. Please try a different card or wait until tomorrow.",
    ),
    (
        INVALID_CARD_INFO,
        "Card information is invalid. Please check your card details and try again.",
    ),
    (INVALID_REQUEST, "Payment request is invalid. Please try again."),
    (
        REDIRECT_URL_REQUIRED,
        "Payment configuration error. Please contact the merchant.",
    ),
    (
        "PaymentDealer.DoDirectPayment3dRequest.InvalidCurrencyCode",
        "Invalid currency. Only GEL is supported.",
    ),
    (
        "PaymentDealer.DoDirectPayment3dRequest.InvalidInstallmentNumber",
        "Invalid installment number. Please select between 1 and 12 installments.",
    ),
    (
        "PaymentDealer.DoDirectPayment3dRequest.InstallmentNotAvailableForForeignCurrencyTransaction",
        "Installments are not available for foreign currency transactions.",
    ),
    (
        "PaymentDealer.DoDirectPayment3dRequest.ForeignCurrencyNotAvailableForThisDealer",
        "Foreign currency payments are not available. Please contact the merchant.",
    ),
    (
        "PaymentDealer.DoDirectPayment3dRequest.PaymentMustBeAuthorization",
        "This payment requires authorization. Please contact the merchant.",
    ),
    (
        "PaymentDealer.DoDirectPayment3dRequest.AuthorizationForbiddenForThisDealer",
        "Pre-authorization is not enabled for this merchant.",
    ),
    (
        "PaymentDealer.DoDirectPayment3dRequest.PoolPaymentNotAvailableForDealer",
        "Pooled payments are not available for this merchant.",
    ),
    (
        "PaymentDealer.DoDirectPayment3dRequest.PoolPaymentRequiredForDealer",
        "This merchant requires pooled payments. Please contact the merchant.",
    ),
    (
        "PaymentDealer.DoDirectPayment3dRequest.TokenizationNotAvailableForDealer",
        "Saved cards are not available for this merchant.",
    ),
    (
        "PaymentDealer.DoDirectPayment3dRequest.CardTokenCannotUseWithSaveCard",
        "Cannot use saved card token while saving a card. Please contact support.",
    ),
    (
        "PaymentDealer.DoDirectPayment3dRequest.CardTokenNotFound",
        "Saved card not found. Please enter your card details again.",
    ),
    (
        "PaymentDealer.DoDirectPayment3dRequest.OnlyCardTokenOrCardNumber",
        "Cannot provide both card number and saved card token. Please try again.",
    ),
    (
        "PaymentDealer.DoDirectPayment3dRequest.ChannelPermissionNotAvailable",
        "This payment channel is not available for the merchant. Please contact the merchant.",
    ),
    (
        "PaymentDealer.DoDirectPayment3dRequest.IpAddressNotAllowed",
        "Payment request from your location is not allowed. Please contact the merchant.",
    ),
    (
        "PaymentDealer.DoDirectPayment3dRequest.VirtualPosNotAvailable",
        "No suitable payment terminal found for your card. Please try a different card.",
    ),
    (
        "PaymentDealer.DoDirectPayment3dRequest.ThisInstallmentNumberNotAvailableForVirtualPos",
        "This installment option is not available for your card. Please select a different installment plan.",
    ),
    (
        "PaymentDealer.DoDirectPayment3dRequest.ThisInstallmentNumberNotAvailableForDealer",
        "This installment option is not available. Please select a different installment plan.",
    ),
    (
        "PaymentDealer.DoDirectPayment3dRequest.DealerCommissionRateNotFound",
        "Merchant commission rate not configured for this installment plan. Please contact the merchant.",
    ),
    (
        "PaymentDealer.DoDirectPayment3dRequest.DealerGroupCommissionRateNotFound",
        "Merchant group commission rate not configured. Please contact the merchant.",
    ),
    (
        "PaymentDealer.DoDirectPayment3dRequest.InvalidSubMerchantName",
        "Invalid merchant configuration. Please contact the merchant.",
    ),
    (
        "PaymentDealer.DoDirectPayment3dRequest.InvalidUnitPrice",
        "Invalid product price. Please contact the merchant.",
    ),
    (
        "PaymentDealer.DoDirectPayment3dRequest.InvalidQuantityValue",
        "Invalid product quantity. Please contact the merchant.",
    ),
    (
        "PaymentDealer.DoDirectPayment3dRequest.BasketAmountIsNotEqualPaymentAmount",
        "Cart amount does not match payment amount. Please try again.",
    ),
    (
        "PaymentDealer.DoDirectPayment3dRequest.BasketProductNotFoundInYourProductList",
        "Product not found in merchant catalog. Please contact the merchant.",
    ),
];

const MERCHANT_CONFIGURATION_ERRORS: &[&str] = &[
    "PaymentDealer.CheckPaymentDealerAuthentication.InvalidRequest",
    "PaymentDealer.CheckPaymentDealerAuthentication.InvalidAccount",
    "PaymentDealer.CheckPaymentDealerAuthentication.VirtualPosNotFound",
    REDIRECT_URL_REQUIRED,
    "PaymentDealer.DoDirectPayment3dRequest.ForeignCurrencyNotAvailableForThisDealer",
    "PaymentDealer.DoDirectPayment3dRequest.AuthorizationForbiddenForThisDealer",
    "PaymentDealer.DoDirectPayment3dRequest.PoolPaymentNotAvailableForDealer",
    "PaymentDealer.DoDirectPayment3dRequest.PoolPaymentRequiredForDealer",
    "PaymentDealer.DoDirectPayment3dRequest.TokenizationNotAvailableForDealer",
    "PaymentDealer.DoDirectPayment3dRequest.ChannelPermissionNotAvailable",
    "PaymentDealer.DoDirectPayment3dRequest.IpAddressNotAllowed",
    "PaymentDealer.DoDirectPayment3dRequest.DealerCommissionRateNotFound",
    "PaymentDealer.DoDirectPayment3dRequest.DealerGroupCommissionRateNotFound",
    "PaymentDealer.DoDirectPayment3dRequest.InvalidSubMerchantName",
];

const CUSTOMER_CARD_ERRORS: &[&str] = &[
    INVALID_CARD_INFO,
    "PaymentDealer.CheckDealerPaymentLimits.DailyCardLimitExceeded",
    "PaymentDealer.DoDirectPayment3dRequest.CardTokenNotFound",
    "PaymentDealer.DoDirectPayment3dRequest.VirtualPosNotAvailable",
];

/// Who can act on an error. Used to route log triage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorAudience {
    Merchant,
    Customer,
    Unclassified,
}

/// Message shown to the shopper for a processor result code.
///
/// Unknown codes wrap the processor's own message; `EX` never leaks it.
pub fn message(error_code: &str, fallback_message: &str) -> String {
    if let Some((_, text)) = MESSAGES.iter().find(|(code, _)| *code == error_code) {
        return (*text).to_string();
    }

    if error_code == UNEXPECTED_ERROR_CODE {
        return SYSTEM_ERROR_MESSAGE.to_string();
    }

    if !fallback_message.trim().is_empty() {
        return format!("Payment processing error: {}", fallback_message.trim());
    }

    GENERIC_MESSAGE.to_string()
}

pub fn is_merchant_configuration_error(error_code: &str) -> bool {
    MERCHANT_CONFIGURATION_ERRORS.contains(&error_code)
}

pub fn is_customer_card_error(error_code: &str) -> bool {
    CUSTOMER_CARD_ERRORS.contains(&error_code)
}

pub fn audience(error_code: &str) -> ErrorAudience {
    if is_merchant_configuration_error(error_code) {
        ErrorAudience::Merchant
    } else if is_customer_card_error(error_code) {
        ErrorAudience::Customer
    } else {
        ErrorAudience::Unclassified
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_code_maps_to_friendly_message() {
        assert_eq!(
            message(INVALID_CARD_INFO, "raw bank text"),
            "Card information is invalid. Please check your card details and try again."
        );
    }

    #[test]
    fn test_unexpected_error_code_hides_processor_message() {
        let msg = message(UNEXPECTED_ERROR_CODE, "NullReferenceException at line 42");
        assert_eq!(msg, SYSTEM_ERROR_MESSAGE);
        assert!(!msg.contains("NullReference"));
    }

    #[test]
    fn test_unknown_code_wraps_fallback() {
        assert_eq!(
            message("Failed", "Payment declined by bank"),
            "Payment processing error: Payment declined by bank"
        );
    }

    #[test]
    fn test_unknown_code_without_fallback_is_generic() {
        assert_eq!(message("", ""), GENERIC_MESSAGE);
        assert_eq!(message("Some.Unknown.Code", "  "), GENERIC_MESSAGE);
    }

    #[test]
    fn test_merchant_and_customer_sets_are_disjoint() {
        for code in MERCHANT_CONFIGURATION_ERRORS {
            assert!(!is_customer_card_error(code), "{} is in both sets", code);
        }
    }

    #[test]
    fn test_every_classified_code_has_a_message() {
        for code in MERCHANT_CONFIGURATION_ERRORS.iter().chain(CUSTOMER_CARD_ERRORS) {
            assert!(
                MESSAGES.iter().any(|(known, _)| known == code),
                "{} has no message",
                code
            );
        }
    }

    #[test]
    fn test_audience() {
        assert_eq!(audience(REDIRECT_URL_REQUIRED), ErrorAudience::Merchant);
        assert_eq!(audience(INVALID_CARD_INFO), ErrorAudience::Customer);
        assert_eq!(audience(INVALID_REQUEST), ErrorAudience::Unclassified);
        assert_eq!(audience("Failed"), ErrorAudience::Unclassified);
    }
}
