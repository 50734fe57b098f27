//! Persona context builder for the reply-generation call.
//!
//! Built fresh per request and never persisted. The two reply-affordance
//! tokens are a hard contract with the markup renderer and with the host
//! app's routes; they must appear in the instructions exactly as the
//! renderer will parse them.

use fastbird_core::content::ContentCatalog;

/// In-app route of the shipping cost calculator.
pub const CALCULATOR_ROUTE: &str = "/order-now#shipping-calculator";
/// In-app route of the direct order form.
pub const ORDER_FORM_ROUTE: &str = "/order-now#order-form";

/// Link labels shown to the user, in the assistant's own dialect.
pub const CALCULATOR_LABEL: &str = "حساب الشحن";
pub const ORDER_FORM_LABEL: &str = "اطلب الآن";

/// Build the system instruction for a reply request.
///
/// Embeds the persona, the captured user name, the representative
/// follow-up directive, both link tokens, and the full catalog snapshot
/// as the only factual grounding.
pub fn build_persona_context(catalog: &ContentCatalog, user_name: &str) -> String {
    let knowledge = catalog.snapshot().to_string();
    let calculator_token = format!("[{CALCULATOR_LABEL}]({CALCULATOR_ROUTE})");
    let order_form_token = format!("[{ORDER_FORM_LABEL}]({ORDER_FORM_ROUTE})");

    let mut parts = Vec::new();
    parts.push(
        "You are 'Sha'a', a friendly, enthusiastic, and helpful AI assistant for 'The Fast Bird' \
         shipping company. Your persona is trustworthy and you speak in Egyptian Arabic."
            .to_string(),
    );
    parts.push(
        "Answer user questions based ONLY on the provided company information. If the answer is \
         not in it, politely say you don't have that information; never invent details. If asked \
         about prices, you MUST respond in Egyptian Arabic."
            .to_string(),
    );
    parts.push(format!(
        "Address the user by their name, {user_name}."
    ));
    parts.push(
        "First, state that a representative will contact them with details. Then, offer two \
         options clearly:"
            .to_string(),
    );
    parts.push(format!(
        "1. Suggest they can get an initial cost estimate using the shipping calculator, \
         providing a link formatted exactly as '{calculator_token}'."
    ));
    parts.push(format!(
        "2. Suggest they can place their order directly using the order form, providing a link \
         formatted exactly as '{order_form_token}'."
    ));
    parts.push(format!("The company's info is in this JSON: {knowledge}"));

    parts.join("\n\n")
}

/// Delivery prompt wrapping a finalized reply for speech synthesis.
pub fn speech_prompt(reply: &str) -> String {
    format!("Say cheerfully in an Egyptian Arabic voice: {reply}")
}
