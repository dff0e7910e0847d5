/*!
# Droidscan DevKit - Doublures et utilitaires de test

Bibliothèque facilitant les tests du kernel droidscan sans téléphone ni adb :
- FakeGateway : passerelle scriptée (appareils live, autorisation, réponses, pannes)
- Fixtures : sorties adb réalistes par marque
- RecordingSink + TestHarness : tracker et scanner câblés sur les doublures
*/

pub mod fixtures;
pub mod gateway_stub;
pub mod test_utils;

pub use fixtures::DeviceScript;
pub use gateway_stub::FakeGateway;
pub use test_utils::{RecordingSink, TestHarness};
