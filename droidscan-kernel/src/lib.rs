/*!
 * DROIDSCAN KERNEL - Suivi de présence et scans d'appareils Android via adb
 *
 * Modules, des feuilles vers le coeur :
 * - gateway : passerelle adb (process)
 * - brands : résolution de marque + extracteurs polymorphes
 * - presence : état des appareils connectés + boucle de polling supervisée
 * - scanner : scans fast/full, progression, persistence
 * - store / events / http / mqtt : collaborateurs concrets
 */

pub mod brands;
pub mod compare;
pub mod config;
pub mod events;
pub mod gateway;
pub mod http;
pub mod models;
pub mod mqtt;
pub mod presence;
pub mod scanner;
pub mod state;
pub mod store;
