pub mod klaviyo_service;
