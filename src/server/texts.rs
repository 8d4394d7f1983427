//! User-facing strings for every conversation language. Rendering lives
//! here, next to the transport; the engine never sees message text.

use crate::domain_model::{ChallengeOption, Language};

pub fn welcome(language: Language) -> &'static str {
    match language {
        Language::English => "Welcome! Please select your preferred language to continue.",
        Language::Hindi => "स्वागत है! कृपया आगे बढ़ने के लिए अपनी भाषा चुनें।",
        Language::Hinglish => "Welcome! Aage badhne ke liye apni language chunein.",
    }
}

pub fn verify(language: Language) -> &'static str {
    match language {
        Language::English => "Please verify that you are human to join this chat.",
        Language::Hindi => "जुड़ने के लिए कृपया पुष्टि करें कि आप इंसान हैं।",
        Language::Hinglish => "Please verify karein ki aap human hain taaki channel join ho sake.",
    }
}

pub fn success(language: Language) -> &'static str {
    match language {
        Language::English => "Verification successful. You have been approved.",
        Language::Hindi => "सफल! आपको approve कर दिया गया है।",
        Language::Hinglish => "Verification successful. Aapko approve kar diya gaya hai.",
    }
}

pub fn failed(language: Language) -> &'static str {
    match language {
        Language::English => "Verification failed. Please request to join again.",
        Language::Hindi => "सत्यापन विफल हुआ। कृपया दोबारा join request भेजें।",
        Language::Hinglish => "Verification failed. Kripya dobara request bhejein.",
    }
}

pub fn expired(language: Language) -> &'static str {
    match language {
        Language::English => "Verification expired. Please request to join again.",
        Language::Hindi => "Verification का समय समाप्त हो गया। कृपया दोबारा join request भेजें।",
        Language::Hinglish => "Verification ka time khatam ho gaya. Kripya dobara request bhejein.",
    }
}

pub fn held_for_review(language: Language) -> &'static str {
    match language {
        Language::English => "Verification could not complete. An admin will review your request.",
        Language::Hindi => "Verification पूरा नहीं हो सका। Admin आपकी request देखेंगे।",
        Language::Hinglish => "Verification complete nahi hua. Admin aapki request review karenge.",
    }
}

pub fn attempts_left(language: Language, remaining: u32) -> String {
    match language {
        Language::English => format!("Wrong choice. Attempts left: {remaining}."),
        Language::Hindi => format!("गलत चयन। शेष प्रयास: {remaining}."),
        Language::Hinglish => format!("Wrong choice. Attempts left: {remaining}."),
    }
}

pub fn challenge_button(option: ChallengeOption) -> &'static str {
    match option {
        ChallengeOption::Human => "I am Human",
        ChallengeOption::Bot => "I am a Bot",
        ChallengeOption::Skip => "Skip Verification",
        ChallengeOption::Auto => "Auto Join",
    }
}
